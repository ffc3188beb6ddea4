use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::accounts::find_account;
use super::{col_ts, col_uuid, now, ts, Database};
use crate::credentials::{generate_token, hash_token};
use crate::models::*;
use crate::StoreError;

struct StoredToken {
    account_id: Uuid,
    kind: TokenKind,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

fn find_token(conn: &Connection, token_hash: &str) -> Result<Option<StoredToken>, StoreError> {
    let token = conn
        .query_row(
            "SELECT account_id, kind, expires_at, revoked_at IS NOT NULL
             FROM auth_tokens WHERE token_hash = ?1",
            params![token_hash],
            |row| {
                let kind: String = row.get(1)?;
                Ok((col_uuid(row, 0)?, kind, col_ts(row, 2)?, row.get::<_, bool>(3)?))
            },
        )
        .optional()?;

    Ok(token.and_then(|(account_id, kind, expires_at, revoked)| {
        Some(StoredToken {
            account_id,
            kind: TokenKind::from_str(&kind)?,
            expires_at,
            revoked,
        })
    }))
}

/// A token of the expected kind that is neither revoked nor expired.
fn live_token(
    conn: &Connection,
    token_hash: &str,
    kind: TokenKind,
) -> Result<StoredToken, StoreError> {
    match find_token(conn, token_hash)? {
        Some(token) if token.kind == kind && !token.revoked && token.expires_at > now() => {
            Ok(token)
        }
        _ => Err(StoreError::InvalidToken),
    }
}

fn insert_token(
    conn: &Connection,
    account_id: Uuid,
    kind: TokenKind,
    token_hash: &str,
    refresh_hash: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO auth_tokens (token_hash, account_id, kind, refresh_hash, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            token_hash,
            account_id.to_string(),
            kind.as_str(),
            refresh_hash,
            ts(&expires_at),
            ts(&now()),
        ],
    )?;
    Ok(())
}

impl Database {
    /// Mint a refresh token and a first access token bound to it.
    pub fn issue_tokens(
        &self,
        account_id: Uuid,
        policy: &TokenPolicy,
    ) -> Result<TokenPair, StoreError> {
        let refresh = generate_token();
        let access = generate_token();
        let refresh_hash = hash_token(&policy.secret_key, &refresh);
        let access_hash = hash_token(&policy.secret_key, &access);
        let issued = now();

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            insert_token(
                &tx,
                account_id,
                TokenKind::Refresh,
                &refresh_hash,
                None,
                issued + policy.refresh_ttl,
            )?;
            insert_token(
                &tx,
                account_id,
                TokenKind::Access,
                &access_hash,
                Some(&refresh_hash),
                issued + policy.access_ttl,
            )?;
            tx.commit()?;
            Ok(TokenPair { refresh, access })
        })
    }

    /// Exchange a live refresh token for a new access token.
    pub fn refresh_access_token(
        &self,
        refresh: &str,
        policy: &TokenPolicy,
    ) -> Result<String, StoreError> {
        let refresh_hash = hash_token(&policy.secret_key, refresh);
        let access = generate_token();
        let access_hash = hash_token(&policy.secret_key, &access);

        self.with_conn(|conn| {
            let stored = live_token(conn, &refresh_hash, TokenKind::Refresh)?;
            let account =
                find_account(conn, stored.account_id)?.ok_or(StoreError::InvalidToken)?;
            if !account.is_active {
                return Err(StoreError::AccountDisabled);
            }
            insert_token(
                conn,
                stored.account_id,
                TokenKind::Access,
                &access_hash,
                Some(&refresh_hash),
                now() + policy.access_ttl,
            )?;
            Ok(access)
        })
    }

    /// Resolve an access token to its (active) account.
    pub fn authenticate_access_token(
        &self,
        access: &str,
        policy: &TokenPolicy,
    ) -> Result<Account, StoreError> {
        let access_hash = hash_token(&policy.secret_key, access);
        self.with_conn(|conn| {
            let stored = live_token(conn, &access_hash, TokenKind::Access)?;
            let account =
                find_account(conn, stored.account_id)?.ok_or(StoreError::InvalidToken)?;
            if !account.is_active {
                return Err(StoreError::AccountDisabled);
            }
            Ok(account)
        })
    }

    /// Revoke a refresh token owned by `account_id` together with every access
    /// token minted from it.
    pub fn revoke_refresh_token(
        &self,
        account_id: Uuid,
        refresh: &str,
        policy: &TokenPolicy,
    ) -> Result<(), StoreError> {
        let refresh_hash = hash_token(&policy.secret_key, refresh);
        self.with_conn(|conn| {
            let stored = live_token(conn, &refresh_hash, TokenKind::Refresh)?;
            if stored.account_id != account_id {
                return Err(StoreError::InvalidToken);
            }
            let revoked_at = ts(&now());
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE auth_tokens SET revoked_at = ?2
                 WHERE (token_hash = ?1 OR refresh_hash = ?1) AND revoked_at IS NULL",
                params![refresh_hash, revoked_at],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Drop expired token rows. Returns the number removed.
    pub fn purge_expired_tokens(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            // access rows of an expired refresh token go with it (ON DELETE CASCADE)
            let removed = conn.execute(
                "DELETE FROM auth_tokens WHERE expires_at <= ?1",
                params![ts(&now())],
            )?;
            Ok(removed)
        })
    }
}
