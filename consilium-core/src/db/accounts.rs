use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{col_ts, col_uuid, now, ts, Database};
use crate::credentials::{hash_password, verify_password};
use crate::models::*;
use crate::validation::{self, sanitize_text, FieldErrors, MAX_NAME_LEN};
use crate::StoreError;

const ACCOUNT_COLUMNS: &str =
    "id, phone, name, email, is_active, is_staff, total_analyses, created_at, updated_at";

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: col_uuid(row, 0)?,
        phone: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        is_active: row.get(4)?,
        is_staff: row.get(5)?,
        total_analyses: row.get(6)?,
        created_at: col_ts(row, 7)?,
        updated_at: col_ts(row, 8)?,
    })
}

pub(super) fn find_account(conn: &Connection, id: Uuid) -> Result<Option<Account>, StoreError> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            params![id.to_string()],
            row_to_account,
        )
        .optional()?;
    Ok(account)
}

fn phone_taken(conn: &Connection, phone: &str, except: Option<Uuid>) -> Result<bool, StoreError> {
    let owner: Option<String> = conn
        .query_row(
            "SELECT id FROM accounts WHERE phone = ?1",
            params![phone],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match (owner, except) {
        (None, _) => false,
        (Some(owner), Some(except)) => owner != except.to_string(),
        (Some(_), None) => true,
    })
}

/// Keep `total_analyses` equal to the number of analyses the account owns.
pub(super) fn refresh_account_stats(conn: &Connection, account_id: Uuid) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE accounts
         SET total_analyses = (SELECT COUNT(*) FROM analyses WHERE user_id = ?1)
         WHERE id = ?1",
        params![account_id.to_string()],
    )?;
    Ok(())
}

fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

impl Database {
    /// Register a new account. `iterations` is the PBKDF2 work factor.
    pub fn create_account(
        &self,
        input: CreateAccountInput,
        iterations: u32,
    ) -> Result<Account, StoreError> {
        let phone = input.phone.trim().to_string();
        let name = sanitize_text(&input.name);
        let email = normalize_email(input.email);

        let mut errors = FieldErrors::new();
        errors.check("phone", validation::validate_phone(&phone));
        errors.check("name", validation::validate_required_text(&name, MAX_NAME_LEN));
        if let Some(email) = &email {
            errors.check("email", validation::validate_email(email));
        }
        errors.check("password", validation::validate_password(&input.password));
        errors.into_result()?;

        let password_hash = hash_password(&input.password, iterations);

        self.with_conn(|conn| {
            if phone_taken(conn, &phone, None)? {
                return Err(StoreError::field(
                    "phone",
                    "user with this phone number already exists.",
                ));
            }

            let id = Uuid::new_v4();
            let created = now();
            conn.execute(
                "INSERT INTO accounts (id, phone, name, email, password_hash, is_active, is_staff,
                                       total_analyses, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, 0, ?7, ?7)",
                params![
                    id.to_string(),
                    phone,
                    name,
                    email,
                    password_hash,
                    input.is_staff,
                    ts(&created),
                ],
            )?;
            tracing::info!(account_id = %id, staff = input.is_staff, "account created");

            find_account(conn, id)?.ok_or(StoreError::NotFound("account"))
        })
    }

    pub fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.with_conn(|conn| find_account(conn, id))
    }

    /// Check a phone/password pair. Unknown phones and wrong passwords are
    /// indistinguishable to the caller.
    pub fn verify_credentials(&self, phone: &str, password: &str) -> Result<Account, StoreError> {
        let found: Option<(String, String)> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, password_hash FROM accounts WHERE phone = ?1",
                    params![phone.trim()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })?;

        // hash outside the lock, PBKDF2 is slow
        let Some((id, password_hash)) = found else {
            return Err(StoreError::InvalidCredentials);
        };
        if !verify_password(password, &password_hash) {
            return Err(StoreError::InvalidCredentials);
        }

        let id = Uuid::parse_str(&id).map_err(|_| StoreError::NotFound("account"))?;
        let account = self
            .get_account(id)?
            .ok_or(StoreError::NotFound("account"))?;
        if !account.is_active {
            return Err(StoreError::AccountDisabled);
        }
        Ok(account)
    }

    pub fn update_account(
        &self,
        id: Uuid,
        input: UpdateAccountInput,
    ) -> Result<Account, StoreError> {
        let phone = input.phone.map(|p| p.trim().to_string());
        let name = input.name.map(|n| sanitize_text(&n));
        let email = input.email.map(normalize_email);

        let mut errors = FieldErrors::new();
        if let Some(phone) = &phone {
            errors.check("phone", validation::validate_phone(phone));
        }
        if let Some(name) = &name {
            errors.check("name", validation::validate_required_text(name, MAX_NAME_LEN));
        }
        if let Some(Some(email)) = &email {
            errors.check("email", validation::validate_email(email));
        }
        errors.into_result()?;

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let existing = find_account(&tx, id)?.ok_or(StoreError::NotFound("account"))?;

            if let Some(phone) = &phone {
                if phone_taken(&tx, phone, Some(id))? {
                    return Err(StoreError::field(
                        "phone",
                        "user with this phone number already exists.",
                    ));
                }
            }

            tx.execute(
                "UPDATE accounts SET phone = ?2, name = ?3, email = ?4, updated_at = ?5 WHERE id = ?1",
                params![
                    id.to_string(),
                    phone.unwrap_or(existing.phone),
                    name.unwrap_or(existing.name),
                    email.unwrap_or(existing.email),
                    ts(&now()),
                ],
            )?;
            let updated = find_account(&tx, id)?.ok_or(StoreError::NotFound("account"))?;
            tx.commit()?;
            Ok(updated)
        })
    }

    pub fn change_password(
        &self,
        id: Uuid,
        old_password: &str,
        new_password: &str,
        iterations: u32,
    ) -> Result<(), StoreError> {
        let current = self.password_hash(id)?;

        let mut errors = FieldErrors::new();
        if !verify_password(old_password, &current) {
            errors.add("old_password", "Old password is incorrect.");
        }
        errors.check("new_password", validation::validate_password(new_password));
        errors.into_result()?;
        let new_hash = hash_password(new_password, iterations);

        self.with_conn(|conn| {
            // only write if nobody changed it while we were hashing
            let changed = conn.execute(
                "UPDATE accounts SET password_hash = ?2, updated_at = ?3
                 WHERE id = ?1 AND password_hash = ?4",
                params![id.to_string(), new_hash, ts(&now()), current],
            )?;
            if changed == 0 {
                return Err(StoreError::field(
                    "old_password",
                    "Old password is incorrect.",
                ));
            }
            tracing::info!(account_id = %id, "password changed");
            Ok(())
        })
    }

    fn password_hash(&self, id: Uuid) -> Result<String, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT password_hash FROM accounts WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound("account"))
        })
    }

    /// Enable or disable sign-in for an account.
    pub fn set_account_active(&self, id: Uuid, active: bool) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE accounts SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), active, ts(&now())],
            )?;
            Ok(changed > 0)
        })
    }
}
