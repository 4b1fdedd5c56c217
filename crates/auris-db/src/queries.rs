use crate::Database;
use crate::models::{AccountRow, ReactionRow, SessionRow, WhisperRow};
use anyhow::Result;
use rusqlite::Row;

/// True when the statement failed on a UNIQUE constraint.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Database {
    // -- Sessions --

    pub fn create_session(&self, id: &str, created_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, created_at) VALUES (?1, ?2)",
                (id, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, revoked, created_at FROM sessions WHERE id = ?1")?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        revoked: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    /// A session accepts new writes only while it exists and is not revoked.
    pub fn session_is_active(&self, id: &str) -> Result<bool> {
        Ok(self.get_session(id)?.is_some_and(|s| !s.revoked))
    }

    /// Returns false if the session was already revoked or never existed.
    pub fn revoke_session(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE sessions SET revoked = 1 WHERE id = ?1 AND revoked = 0",
                [id],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Accounts --

    /// Returns false if the username or email is already taken.
    pub fn create_account(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
        created_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let res = conn.execute(
                "INSERT INTO accounts (id, username, email, password, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, username, email, password_hash, display_name, created_at],
            );
            match res {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&select_account("email = ?1"))?;
            let row = stmt.query_row([email], map_account_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_account_by_id(&self, id: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&select_account("id = ?1"))?;
            let row = stmt.query_row([id], map_account_row).optional()?;
            Ok(row)
        })
    }

    /// Deletes the principal. Index tables cascade; whispers do not, so they
    /// stay in the store with their creator_id orphaned.
    pub fn delete_account(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
            Ok(changed == 1)
        })
    }

    pub fn bump_reactions_given(&self, account_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE accounts SET reactions_given = reactions_given + 1 WHERE id = ?1",
                [account_id],
            )?;
            Ok(())
        })
    }

    /// Recomputes likes_received from scratch: the sum of reactions across
    /// every whisper attributed to this creator. Full recount, never an
    /// increment, so any previously dropped stat write heals here.
    pub fn recompute_likes_received(&self, creator_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let total: u32 = conn.query_row(
                "SELECT COUNT(*) FROM reactions r
                 JOIN whispers w ON r.whisper_id = w.id
                 WHERE w.creator_id = ?1",
                [creator_id],
                |row| row.get(0),
            )?;
            conn.execute(
                "UPDATE accounts SET likes_received = ?1 WHERE id = ?2",
                rusqlite::params![total, creator_id],
            )?;
            Ok(total)
        })
    }

    // -- Whispers --

    pub fn insert_whisper(&self, w: &WhisperRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO whispers
                    (id, text, tone, lat, lng, why_here, session_id, creator_id,
                     proximity_required, dwell_time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    w.id,
                    w.text,
                    w.tone,
                    w.lat,
                    w.lng,
                    w.why_here,
                    w.session_id,
                    w.creator_id,
                    w.proximity_required,
                    w.dwell_time,
                    w.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_whisper(&self, id: &str) -> Result<Option<WhisperRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&select_whispers("id = ?1"))?;
            let row = stmt.query_row([id], map_whisper_row).optional()?;
            Ok(row)
        })
    }

    /// Bounding-box prefilter over the (lat, lng) index, most recent first.
    /// Callers apply the exact haversine check on what comes back. When
    /// `lng_wraps` is set the longitude range crosses the antimeridian and
    /// reads as two intervals, [min_lng, 180] and [-180, max_lng].
    pub fn whispers_in_bbox(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
        lng_wraps: bool,
    ) -> Result<Vec<WhisperRow>> {
        let lng_predicate = if lng_wraps {
            "(lng >= ?3 OR lng <= ?4)"
        } else {
            "lng BETWEEN ?3 AND ?4"
        };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&select_whispers(&format!(
                "lat BETWEEN ?1 AND ?2 AND {lng_predicate} ORDER BY created_at DESC"
            )))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![min_lat, max_lat, min_lng, max_lng],
                    map_whisper_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn whispers_by_session(&self, session_id: &str) -> Result<Vec<WhisperRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&select_whispers("session_id = ?1 ORDER BY created_at DESC"))?;
            let rows = stmt
                .query_map([session_id], map_whisper_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn whispers_by_creator(&self, creator_id: &str) -> Result<Vec<WhisperRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&select_whispers("creator_id = ?1 ORDER BY created_at DESC"))?;
            let rows = stmt
                .query_map([creator_id], map_whisper_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_whisper(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM whispers WHERE id = ?1", [id])?;
            Ok(changed == 1)
        })
    }

    // -- Discovery ledger --

    /// Idempotent append. The UNIQUE(whisper_id, identity) constraint, not
    /// application locking, guarantees exactly one row per pair even under
    /// concurrent attempts. Returns true only for the first insertion.
    pub fn record_discovery(&self, whisper_id: &str, identity: &str, created_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO discoveries (whisper_id, identity, created_at)
                 VALUES (?1, ?2, ?3)",
                (whisper_id, identity, created_at),
            )?;
            Ok(changed == 1)
        })
    }

    /// Appends to the account's discovered index and bumps its counter, but
    /// only on first insertion. A repeat is a no-op for both.
    pub fn record_account_discovery(
        &self,
        account_id: &str,
        whisper_id: &str,
        created_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let changed = tx.execute(
                "INSERT OR IGNORE INTO account_discoveries (account_id, whisper_id, created_at)
                 VALUES (?1, ?2, ?3)",
                (account_id, whisper_id, created_at),
            )?;
            if changed == 1 {
                tx.execute(
                    "UPDATE accounts SET whispers_discovered = whispers_discovered + 1
                     WHERE id = ?1",
                    [account_id],
                )?;
            }
            tx.commit()?;
            Ok(changed == 1)
        })
    }

    /// Batch-fetch discoverer identities for a set of whisper IDs.
    pub fn discoverers_for_whispers(&self, whisper_ids: &[String]) -> Result<Vec<(String, String)>> {
        if whisper_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=whisper_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT whisper_id, identity FROM discoveries WHERE whisper_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = whisper_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Whispers a given identity has unlocked, most recent first. The inner
    /// join silently drops ledger entries whose whisper was deleted.
    pub fn discovered_whispers_for_identity(&self, identity: &str) -> Result<Vec<WhisperRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.text, w.tone, w.lat, w.lng, w.why_here, w.session_id,
                        w.creator_id, w.proximity_required, w.dwell_time, w.created_at
                 FROM whispers w
                 JOIN discoveries d ON d.whisper_id = w.id
                 WHERE d.identity = ?1
                 ORDER BY w.created_at DESC",
            )?;
            let rows = stmt
                .query_map([identity], map_whisper_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn discovered_whispers_for_account(&self, account_id: &str) -> Result<Vec<WhisperRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.text, w.tone, w.lat, w.lng, w.why_here, w.session_id,
                        w.creator_id, w.proximity_required, w.dwell_time, w.created_at
                 FROM whispers w
                 JOIN account_discoveries ad ON ad.whisper_id = w.id
                 WHERE ad.account_id = ?1
                 ORDER BY w.created_at DESC",
            )?;
            let rows = stmt
                .query_map([account_id], map_whisper_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reactions --

    /// Idempotent by UNIQUE(whisper_id, session_id). Returns false when this
    /// session already reacted, a user-facing condition rather than an error.
    pub fn add_reaction(&self, whisper_id: &str, session_id: &str, created_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO reactions (whisper_id, session_id, created_at)
                 VALUES (?1, ?2, ?3)",
                (whisper_id, session_id, created_at),
            )?;
            Ok(changed == 1)
        })
    }

    /// Batch-fetch reactions for a set of whisper IDs.
    pub fn reactions_for_whispers(&self, whisper_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if whisper_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=whisper_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT whisper_id, session_id, kind, created_at
                 FROM reactions WHERE whisper_id IN ({})
                 ORDER BY created_at ASC",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = whisper_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ReactionRow {
                        whisper_id: row.get(0)?,
                        session_id: row.get(1)?,
                        kind: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Account linkage --

    /// Appends the whisper to the account's created index, claims creator_id
    /// if it was never set, and bumps the created counter, all only on first
    /// insertion. Safe to repeat.
    pub fn link_whisper_to_account(
        &self,
        account_id: &str,
        whisper_id: &str,
        created_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let changed = tx.execute(
                "INSERT OR IGNORE INTO account_whispers (account_id, whisper_id, created_at)
                 VALUES (?1, ?2, ?3)",
                (account_id, whisper_id, created_at),
            )?;
            if changed == 1 {
                tx.execute(
                    "UPDATE whispers SET creator_id = ?1 WHERE id = ?2 AND creator_id IS NULL",
                    (account_id, whisper_id),
                )?;
                tx.execute(
                    "UPDATE accounts SET whispers_created = whispers_created + 1 WHERE id = ?1",
                    [account_id],
                )?;
            }
            tx.commit()?;
            Ok(changed == 1)
        })
    }

    /// Whispers that carry this creator_id but never made it into the
    /// account's created index (a partial write on some earlier create).
    pub fn unlinked_whisper_ids(&self, account_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM whispers
                 WHERE creator_id = ?1
                   AND id NOT IN
                     (SELECT whisper_id FROM account_whispers WHERE account_id = ?1)",
            )?;
            let rows = stmt
                .query_map([account_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    /// Ledger entries recorded under the account identity that never made it
    /// into the account's discovered index. Dangling entries for deleted
    /// whispers are excluded.
    pub fn unlinked_discovery_ids(&self, account_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.whisper_id FROM discoveries d
                 JOIN whispers w ON w.id = d.whisper_id
                 WHERE d.identity = ?1
                   AND d.whisper_id NOT IN
                     (SELECT whisper_id FROM account_discoveries WHERE account_id = ?1)",
            )?;
            let rows = stmt
                .query_map([account_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes every whisper the account created, both those in the created
    /// index and those only reachable through creator_id, then clears both
    /// indices and zeroes the stats. Whispers the account merely discovered
    /// are untouched. Returns the number of whispers deleted.
    pub fn reset_account_content(&self, account_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let deleted = tx.execute(
                "DELETE FROM whispers
                 WHERE creator_id = ?1
                    OR id IN (SELECT whisper_id FROM account_whispers WHERE account_id = ?1)",
                [account_id],
            )?;
            tx.execute(
                "DELETE FROM account_whispers WHERE account_id = ?1",
                [account_id],
            )?;
            tx.execute(
                "DELETE FROM account_discoveries WHERE account_id = ?1",
                [account_id],
            )?;
            tx.execute(
                "UPDATE accounts SET whispers_created = 0, whispers_discovered = 0,
                        reactions_given = 0, likes_received = 0
                 WHERE id = ?1",
                [account_id],
            )?;
            tx.commit()?;
            Ok(deleted)
        })
    }
}

fn select_account(predicate: &str) -> String {
    format!(
        "SELECT id, username, email, password, display_name, bio,
                whispers_created, whispers_discovered, reactions_given, likes_received,
                created_at
         FROM accounts WHERE {predicate}"
    )
}

fn map_account_row(row: &Row) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        display_name: row.get(4)?,
        bio: row.get(5)?,
        whispers_created: row.get(6)?,
        whispers_discovered: row.get(7)?,
        reactions_given: row.get(8)?,
        likes_received: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn select_whispers(predicate: &str) -> String {
    format!(
        "SELECT id, text, tone, lat, lng, why_here, session_id, creator_id,
                proximity_required, dwell_time, created_at
         FROM whispers WHERE {predicate}"
    )
}

fn map_whisper_row(row: &Row) -> rusqlite::Result<WhisperRow> {
    Ok(WhisperRow {
        id: row.get(0)?,
        text: row.get(1)?,
        tone: row.get(2)?,
        lat: row.get(3)?,
        lng: row.get(4)?,
        why_here: row.get(5)?,
        session_id: row.get(6)?,
        creator_id: row.get(7)?,
        proximity_required: row.get(8)?,
        dwell_time: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }

    fn whisper(id: &str, lat: f64, lng: f64, session: &str, creator: Option<&str>) -> WhisperRow {
        WhisperRow {
            id: id.into(),
            text: "left this here for you".into(),
            tone: "Longing".into(),
            lat,
            lng,
            why_here: None,
            session_id: session.into(),
            creator_id: creator.map(Into::into),
            proximity_required: 100.0,
            dwell_time: 60,
            created_at: now(),
        }
    }

    fn account(db: &Database, id: &str, name: &str) -> bool {
        db.create_account(id, name, &format!("{name}@example.com"), "hash", None, &now())
            .unwrap()
    }

    #[test]
    fn session_reset_revokes_old_id() {
        let db = db();
        db.create_session("s-old", &now()).unwrap();
        assert!(db.session_is_active("s-old").unwrap());

        assert!(db.revoke_session("s-old").unwrap());
        assert!(!db.session_is_active("s-old").unwrap());
        // Second revoke is a no-op.
        assert!(!db.revoke_session("s-old").unwrap());
        assert!(!db.session_is_active("s-missing").unwrap());
    }

    #[test]
    fn duplicate_username_or_email_rejected() {
        let db = db();
        assert!(account(&db, "a1", "ember"));
        assert!(!db
            .create_account("a2", "ember", "other@example.com", "hash", None, &now())
            .unwrap());
        assert!(!db
            .create_account("a3", "other", "ember@example.com", "hash", None, &now())
            .unwrap());
    }

    #[test]
    fn discovery_is_idempotent_for_ledger_and_stats() {
        let db = db();
        account(&db, "a1", "ember");
        db.insert_whisper(&whisper("w1", 37.0, -122.0, "s1", None)).unwrap();

        assert!(db.record_discovery("w1", "s2", &now()).unwrap());
        assert!(!db.record_discovery("w1", "s2", &now()).unwrap());
        let discoverers = db.discoverers_for_whispers(&["w1".into()]).unwrap();
        assert_eq!(discoverers.len(), 1);

        assert!(db.record_account_discovery("a1", "w1", &now()).unwrap());
        assert!(!db.record_account_discovery("a1", "w1", &now()).unwrap());
        let acct = db.get_account_by_id("a1").unwrap().unwrap();
        assert_eq!(acct.whispers_discovered, 1);
    }

    #[test]
    fn second_reaction_from_same_session_is_rejected() {
        let db = db();
        db.insert_whisper(&whisper("w1", 37.0, -122.0, "s1", None)).unwrap();

        assert!(db.add_reaction("w1", "s2", &now()).unwrap());
        assert!(!db.add_reaction("w1", "s2", &now()).unwrap());
        assert!(db.add_reaction("w1", "s3", &now()).unwrap());

        let rows = db.reactions_for_whispers(&["w1".into()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, "acknowledgement");
    }

    #[test]
    fn likes_received_is_a_full_recount() {
        let db = db();
        account(&db, "a1", "ember");
        db.insert_whisper(&whisper("w1", 37.0, -122.0, "s1", Some("a1"))).unwrap();
        db.insert_whisper(&whisper("w2", 37.0, -122.0, "s1", Some("a1"))).unwrap();

        db.add_reaction("w1", "s2", &now()).unwrap();
        db.add_reaction("w1", "s3", &now()).unwrap();
        db.add_reaction("w2", "s2", &now()).unwrap();

        // Poison the cached stat; the recount must heal it.
        db.with_conn(|conn| {
            conn.execute("UPDATE accounts SET likes_received = 99 WHERE id = 'a1'", [])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.recompute_likes_received("a1").unwrap(), 3);
        let acct = db.get_account_by_id("a1").unwrap().unwrap();
        assert_eq!(acct.likes_received, 3);
    }

    #[test]
    fn linkage_reconciles_unlinked_whispers() {
        let db = db();
        account(&db, "a1", "ember");
        // creator_id set, but never linked into the index.
        db.insert_whisper(&whisper("w1", 37.0, -122.0, "s1", Some("a1"))).unwrap();

        assert_eq!(db.unlinked_whisper_ids("a1").unwrap(), vec!["w1".to_string()]);
        assert!(db.link_whisper_to_account("a1", "w1", &now()).unwrap());
        assert!(db.unlinked_whisper_ids("a1").unwrap().is_empty());
        // Repeat is a no-op.
        assert!(!db.link_whisper_to_account("a1", "w1", &now()).unwrap());

        let acct = db.get_account_by_id("a1").unwrap().unwrap();
        assert_eq!(acct.whispers_created, 1);
    }

    #[test]
    fn linking_claims_creator_on_anonymous_whisper() {
        let db = db();
        account(&db, "a1", "ember");
        db.insert_whisper(&whisper("w1", 37.0, -122.0, "s1", None)).unwrap();

        db.link_whisper_to_account("a1", "w1", &now()).unwrap();
        let w = db.get_whisper("w1").unwrap().unwrap();
        assert_eq!(w.creator_id.as_deref(), Some("a1"));
    }

    #[test]
    fn reset_deletes_created_but_not_discovered() {
        let db = db();
        account(&db, "a1", "ember");
        account(&db, "a2", "wren");

        db.insert_whisper(&whisper("w-mine", 37.0, -122.0, "s1", Some("a1"))).unwrap();
        db.link_whisper_to_account("a1", "w-mine", &now()).unwrap();
        db.insert_whisper(&whisper("w-theirs", 37.0, -122.0, "s2", Some("a2"))).unwrap();
        db.record_account_discovery("a1", "w-theirs", &now()).unwrap();

        let deleted = db.reset_account_content("a1").unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_whisper("w-mine").unwrap().is_none());
        assert!(db.get_whisper("w-theirs").unwrap().is_some());

        let acct = db.get_account_by_id("a1").unwrap().unwrap();
        assert_eq!(acct.whispers_created, 0);
        assert_eq!(acct.whispers_discovered, 0);
        assert_eq!(acct.likes_received, 0);
    }

    #[test]
    fn deleting_account_orphans_its_whispers() {
        let db = db();
        account(&db, "a1", "ember");
        db.insert_whisper(&whisper("w1", 37.0, -122.0, "s1", Some("a1"))).unwrap();
        db.link_whisper_to_account("a1", "w1", &now()).unwrap();

        assert!(db.delete_account("a1").unwrap());
        assert!(db.get_account_by_id("a1").unwrap().is_none());
        // Content persists under the orphaned creator id.
        let w = db.get_whisper("w1").unwrap().unwrap();
        assert_eq!(w.creator_id.as_deref(), Some("a1"));
    }

    #[test]
    fn dangling_ledger_entries_are_skipped() {
        let db = db();
        db.insert_whisper(&whisper("w1", 37.0, -122.0, "s1", None)).unwrap();
        db.record_discovery("w1", "s2", &now()).unwrap();
        db.delete_whisper("w1").unwrap();

        // The ledger row still exists but readers never surface it.
        assert!(db.discovered_whispers_for_identity("s2").unwrap().is_empty());
    }

    #[test]
    fn bbox_query_orders_most_recent_first() {
        let db = db();
        for (id, ts) in [("w1", "2026-01-01T00:00:00.000000Z"), ("w2", "2026-02-01T00:00:00.000000Z")] {
            let mut w = whisper(id, 37.0, -122.0, "s1", None);
            w.created_at = ts.into();
            db.insert_whisper(&w).unwrap();
        }
        db.insert_whisper(&whisper("w-far", 51.5, 0.1, "s1", None)).unwrap();

        let rows = db.whispers_in_bbox(36.9, 37.1, -122.1, -121.9, false).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["w2", "w1"]);
    }

    #[test]
    fn wrapped_bbox_reads_both_sides_of_the_antimeridian() {
        let db = db();
        db.insert_whisper(&whisper("w-east", 0.0, 179.995, "s1", None)).unwrap();
        db.insert_whisper(&whisper("w-west", 0.0, -179.995, "s1", None)).unwrap();
        db.insert_whisper(&whisper("w-greenwich", 0.0, 0.0, "s1", None)).unwrap();

        let rows = db.whispers_in_bbox(-0.1, 0.1, 179.9, -179.9, true).unwrap();
        let mut ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["w-east", "w-west"]);
    }
}
