use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    auth::{new_id, AuthClaims},
    error::{is_unique_violation, ApiError, ApiResult},
    models::{Role, UserRow},
};

const SELECT_USER: &str = r#"SELECT id, uid, name, email, phone, role, is_active, active_session_token, created_at
       FROM users"#;

/// Namespace for the placeholder uid given to walk-in customers. Verified
/// token subjects are opaque provider ids and never carry this prefix, so a
/// sentinel can never match a real authentication callback.
const WALK_IN_PREFIX: &str = "walkin:";

fn is_walk_in_uid(uid: &str) -> bool {
    uid.starts_with(WALK_IN_PREFIX)
}

/// Finds or creates exactly one internal user for a verified identity
/// assertion, matching by priority: external auth id, then phone, then email.
/// Contact fields are refreshed from the assertion; the role is never touched
/// outside the create path.
pub async fn resolve(db: &SqlitePool, claims: &AuthClaims) -> ApiResult<UserRow> {
    let uid = claims.sub.trim();
    if uid.is_empty() {
        return Err(ApiError::Validation("external auth id is required".into()));
    }

    let email = cleaned(claims.email.as_deref()).map(|e| e.to_lowercase());
    let phone = cleaned(claims.phone.as_deref());
    let name = cleaned(claims.name.as_deref());

    if let Some(mut user) = find_by_uid(db, uid).await? {
        sync_contact(db, &mut user, email.as_deref(), phone.as_deref(), name.as_deref()).await?;
        return Ok(user);
    }

    if let Some(phone_value) = phone.as_deref() {
        if let Some(user) = find_by_phone(db, phone_value).await? {
            return link_uid(db, user, uid, email.as_deref(), None, name.as_deref()).await;
        }
    }

    if let Some(email_value) = email.as_deref() {
        if let Some(user) = find_by_email(db, email_value).await? {
            return link_uid(db, user, uid, None, phone.as_deref(), name.as_deref()).await;
        }
    }

    create_user(db, uid, email.as_deref(), phone.as_deref(), name.as_deref()).await
}

/// Reuses or creates a customer record for a walk-in booked by staff. Walk-in
/// users have no real external identity; they get a `walkin:` sentinel uid
/// that no verified token subject can ever collide with, and can be linked to
/// a real identity later through phone matching in [`resolve`].
pub async fn ensure_walk_in(
    conn: &mut SqliteConnection,
    name: &str,
    phone: &str,
) -> ApiResult<UserRow> {
    let existing = sqlx::query_as::<_, UserRow>(&format!(
        "{SELECT_USER} WHERE phone = ? AND role = ? LIMIT 1"
    ))
    .bind(phone)
    .bind(Role::User)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(mut user) = existing {
        if user.name != name {
            sqlx::query("UPDATE users SET name = ? WHERE id = ?")
                .bind(name)
                .bind(&user.id)
                .execute(&mut *conn)
                .await?;
            user.name = name.to_string();
        }
        return Ok(user);
    }

    let user = UserRow {
        id: new_id(),
        uid: Some(format!("{WALK_IN_PREFIX}{}", new_id())),
        name: name.to_string(),
        email: String::new(),
        phone: phone.to_string(),
        role: Role::User,
        is_active: true,
        active_session_token: None,
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        r#"INSERT INTO users (id, uid, name, email, phone, role, is_active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&user.id)
    .bind(&user.uid)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(user.role)
    .bind(&user.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(user)
}

async fn find_by_uid(db: &SqlitePool, uid: &str) -> ApiResult<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE uid = ? LIMIT 1"))
        .bind(uid)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

async fn find_by_phone(db: &SqlitePool, phone: &str) -> ApiResult<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE phone = ? LIMIT 1"))
        .bind(phone)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

async fn find_by_email(db: &SqlitePool, email: &str) -> ApiResult<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE email = ? LIMIT 1"))
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

/// Refreshes contact fields that are present, non-blank and different from
/// what is stored. Never touches role or active state.
async fn sync_contact(
    db: &SqlitePool,
    user: &mut UserRow,
    email: Option<&str>,
    phone: Option<&str>,
    name: Option<&str>,
) -> ApiResult<()> {
    let mut changed = false;
    if let Some(email) = email {
        if user.email != email {
            user.email = email.to_string();
            changed = true;
        }
    }
    if let Some(phone) = phone {
        if user.phone != phone {
            user.phone = phone.to_string();
            changed = true;
        }
    }
    if let Some(name) = name {
        if user.name != name {
            user.name = name.to_string();
            changed = true;
        }
    }

    if changed {
        sqlx::query("UPDATE users SET email = ?, phone = ?, name = ? WHERE id = ?")
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.name)
            .bind(&user.id)
            .execute(db)
            .await?;
    }
    Ok(())
}

/// Binds the external auth id to a user matched by a contact point. A
/// missing uid and a walk-in sentinel both count as unbound.
///
/// If the user already carries a *different* real uid, the contact point
/// belongs to another auth account: the matched user is returned unchanged,
/// no merge. If the uid is meanwhile owned by somebody else, the uid owner
/// wins.
async fn link_uid(
    db: &SqlitePool,
    mut user: UserRow,
    uid: &str,
    email: Option<&str>,
    phone: Option<&str>,
    name: Option<&str>,
) -> ApiResult<UserRow> {
    let unbound = user.uid.as_deref().map_or(true, is_walk_in_uid);
    if unbound {
        if let Some(owner) = find_by_uid(db, uid).await? {
            if owner.id != user.id {
                return Ok(owner);
            }
        }
        user.uid = Some(uid.to_string());
        sqlx::query("UPDATE users SET uid = ? WHERE id = ?")
            .bind(uid)
            .bind(&user.id)
            .execute(db)
            .await?;
    } else if user.uid.as_deref() != Some(uid) {
        return Ok(user);
    }

    sync_contact(db, &mut user, email, phone, name).await?;
    Ok(user)
}

async fn create_user(
    db: &SqlitePool,
    uid: &str,
    email: Option<&str>,
    phone: Option<&str>,
    name: Option<&str>,
) -> ApiResult<UserRow> {
    let user = UserRow {
        id: new_id(),
        uid: Some(uid.to_string()),
        name: name.unwrap_or_default().to_string(),
        email: email.unwrap_or_default().to_string(),
        phone: phone.unwrap_or_default().to_string(),
        role: Role::User,
        is_active: true,
        active_session_token: None,
        created_at: Utc::now().to_rfc3339(),
    };

    let inserted = sqlx::query(
        r#"INSERT INTO users (id, uid, name, email, phone, role, is_active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&user.id)
    .bind(&user.uid)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(user.role)
    .bind(&user.created_at)
    .execute(db)
    .await;

    match inserted {
        Ok(_) => Ok(user),
        // Lost a creation race: somebody wrote the same identity first.
        // Re-run the lookups instead of failing the request.
        Err(err) if is_unique_violation(&err) => {
            if let Some(existing) = find_by_uid(db, uid).await? {
                return Ok(existing);
            }
            if let Some(phone_value) = phone {
                if let Some(existing) = find_by_phone(db, phone_value).await? {
                    return link_uid(db, existing, uid, email, None, name).await;
                }
            }
            if let Some(email_value) = email {
                if let Some(existing) = find_by_email(db, email_value).await? {
                    return link_uid(db, existing, uid, None, phone, name).await;
                }
            }
            Err(ApiError::AccountConflict)
        }
        Err(err) => Err(err.into()),
    }
}

fn cleaned(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
