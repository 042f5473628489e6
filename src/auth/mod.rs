//! Here is all we need for authentication and access control
//!
//! A handler gets its caller through one of the attributes of `marking_lib_derive`:
//! ```ignore
//! use actix_web::{web, HttpRequest, HttpResponse};
//! use markingLib::MarkingCon;
//!
//! #[ensure_marker]
//! pub async fn dashboard(req: HttpRequest, data: web::Data<MarkingCon>) -> HttpResponse {
//!     // `ctx` is the RequestContext of the caller
//!     HttpResponse::Ok().into()
//! }
//! ```
//!
//! Markers start with the hash of their own email as credential. Logging in
//! with it only yields a pending session, which is good for nothing but
//! [`change_password`].

use crate::error::MarkingError;
use crate::model;
use crate::schema::{
    Identity, LoginStatus, Marker, MarkerSlot, PendingIdentity, Report, RequestContext, Role,
    Student,
};
use crate::MarkingCon;
use actix_web::HttpRequest;
use chrono::Utc;
use log::{info, warn};
use rand::RngCore;
use serde::Serialize;
use sha256::digest;
use sqlx::SqlitePool;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// The result of checking an email and password
#[derive(Debug, PartialEq)]
pub enum Authentication {
    Authenticated(Identity),
    /// correct credentials, but still the default one
    MustChangePassword(PendingIdentity),
}

impl Authentication {
    pub fn must_change_password(&self) -> bool {
        matches!(self, Authentication::MustChangePassword(_))
    }
}

/**
 * The different kinds of callers a session can belong to
 */
#[derive(Debug, PartialEq)]
pub enum AuthUser {
    Active(RequestContext),
    PendingPasswordChange {
        identity: PendingIdentity,
        api_key: String,
    },
}

impl AuthUser {
    pub fn email(&self) -> &str {
        match self {
            AuthUser::Active(ctx) => &ctx.identity.email,
            AuthUser::PendingPasswordChange { identity, .. } => &identity.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub api_key: String,
    pub must_change_password: bool,
}

fn identity_of(marker: &Marker) -> Identity {
    Identity {
        email: marker.email.clone(),
        name: marker.name.clone(),
        role: if marker.administrator {
            Role::Administrator
        } else {
            Role::Marker
        },
    }
}

async fn fetch_marker(db: &SqlitePool, email: &str) -> Result<Option<Marker>, MarkingError> {
    let marker = sqlx::query_as::<_, model::Marker>(model::SELECT_MARKER)
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(marker.map(Marker::from))
}

/**
 * Checks the credentials of a marker.
 *
 * Unknown emails and wrong passwords give the same `InvalidCredentials`.
 */
pub async fn authenticate(
    db: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Authentication, MarkingError> {
    if email.is_empty() || password.is_empty() {
        return Err(MarkingError::validation("Please enter both email and password"));
    }

    let marker = match fetch_marker(db, email).await? {
        Some(m) => m,
        None => return Err(MarkingError::InvalidCredentials),
    };

    if digest(password) != marker.password {
        return Err(MarkingError::InvalidCredentials);
    }

    if marker.login_status() == LoginStatus::FirstLogin {
        return Ok(Authentication::MustChangePassword(PendingIdentity {
            email: marker.email,
        }));
    }

    sqlx::query("UPDATE Marker SET LastLogin = ? WHERE Email = ?")
        .bind(Utc::now())
        .bind(&marker.email)
        .execute(db)
        .await?;

    Ok(Authentication::Authenticated(identity_of(&marker)))
}

pub fn is_administrator(identity: &Identity) -> bool {
    identity.role == Role::Administrator
}

/// administrators and the two markers of the student
pub fn can_view_report(identity: &Identity, student: &Student) -> bool {
    is_administrator(identity)
        || MarkerSlot::ALL
            .iter()
            .any(|slot| student.marker_for(*slot) == Some(identity.email.as_str()))
}

/// administrators, or the marker assigned to `slot` of the student the report belongs to
pub fn can_edit_report_slot(
    identity: &Identity,
    student: &Student,
    report: &Report,
    slot: MarkerSlot,
) -> bool {
    if report.student_id != student.id {
        return false;
    }
    is_administrator(identity) || student.marker_for(slot) == Some(identity.email.as_str())
}

/**
 * Replaces the credential of the caller with the hash of `new_password`.
 *
 * For a pending caller this is the step from first login to an active
 * account. The pending sessions are dropped, the marker logs in again.
 */
pub async fn change_password(
    db: &SqlitePool,
    user: &AuthUser,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), MarkingError> {
    let email = user.email();

    if new_password.is_empty() || confirm_password.is_empty() {
        return Err(MarkingError::validation("Please enter both password fields"));
    }
    if new_password != confirm_password {
        return Err(MarkingError::validation("Passwords do not match"));
    }
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(MarkingError::validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    // the hash of the email marks the first login state
    if new_password == email {
        return Err(MarkingError::validation(
            "The new password must not be your email address",
        ));
    }

    let mut tx = db.begin().await?;

    let rows_affected = sqlx::query("UPDATE Marker SET Password = ? WHERE Email = ?")
        .bind(digest(new_password))
        .bind(email)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(MarkingError::InvalidCredentials);
    }

    if let AuthUser::PendingPasswordChange { .. } = user {
        sqlx::query("DELETE FROM user_session WHERE email = ? AND pending_password_change = TRUE")
            .bind(email)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!("password changed for {}", email);
    Ok(())
}

/// generate a random hash
fn gen_api_key() -> String {
    let mut rng = rand::thread_rng();
    let mut bytes: [u8; 64] = [0; 64];
    rng.fill_bytes(&mut bytes);
    let tmp: String = bytes.iter().map(|v| format!("{:02x}", v)).collect();
    digest(tmp)
}

async fn create_session(db: &SqlitePool, email: &str, pending: bool) -> Result<String, MarkingError> {
    let current_timestamp = Utc::now().timestamp();
    let api_key = format!("MARK_{}", gen_api_key());

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO user_session(api_key, email, pending_password_change, time_of_creation, last_refresh) VALUES (?,?,?,?,?)
    "#,
    )
    .bind(&api_key)
    .bind(email)
    .bind(pending)
    .bind(current_timestamp)
    .bind(current_timestamp)
    .execute(db)
    .await
    {
        return Err(MarkingError::persistence("Error while creating the session", e));
    }

    Ok(api_key)
}

/**
 * Authenticates and opens a session.
 *
 * A first login only gets a pending session.
 */
pub async fn login(con: &MarkingCon, email: &str, password: &str) -> Result<LoginResult, MarkingError> {
    let authentication = authenticate(&con.database, email, password).await?;
    let must_change_password = authentication.must_change_password();

    let api_key = create_session(&con.database, email, must_change_password).await?;
    if must_change_password {
        info!("first login of {}, password change required", email);
    } else {
        info!("{} logged in", email);
    }

    Ok(LoginResult {
        api_key,
        must_change_password,
    })
}

pub async fn logout(db: &SqlitePool, api_key: &str) -> Result<(), MarkingError> {
    sqlx::query("DELETE FROM user_session WHERE api_key = ?")
        .bind(api_key)
        .execute(db)
        .await?;
    Ok(())
}

fn req2key(req: &HttpRequest) -> Result<String, MarkingError> {
    let header = match req.headers().get(actix_web::http::header::AUTHORIZATION) {
        Some(h) => h,
        None => return Err(MarkingError::InvalidCredentials),
    };

    let api_key = match header.to_str() {
        Ok(s) => s.trim(),
        Err(_) => return Err(MarkingError::validation("There where none-ascii characters in the api key")),
    };

    let api_key = api_key.strip_prefix("Bearer ").unwrap_or(api_key).trim();
    if api_key.is_empty() {
        return Err(MarkingError::InvalidCredentials);
    }
    Ok(api_key.to_string())
}

/**
 * Looks up a session. While doing this the validity of the session is checked
 * and its refresh time is reset.
 */
pub async fn resolve_session(
    db: &SqlitePool,
    api_key: &str,
    timeout_secs: i64,
) -> Result<AuthUser, MarkingError> {
    let current_timestamp = Utc::now().timestamp();

    let session = match sqlx::query_as::<_, model::Session>(
        "SELECT email, pending_password_change, last_refresh FROM user_session WHERE api_key = ?",
    )
    .bind(api_key)
    .fetch_optional(db)
    .await?
    {
        Some(s) => s,
        None => return Err(MarkingError::InvalidCredentials),
    };

    if current_timestamp - session.last_refresh > timeout_secs {
        logout(db, api_key).await?;
        return Err(MarkingError::InvalidCredentials);
    }

    sqlx::query("UPDATE user_session SET last_refresh = ? WHERE api_key = ?")
        .bind(current_timestamp)
        .bind(api_key)
        .execute(db)
        .await?;

    if session.pending_password_change {
        return Ok(AuthUser::PendingPasswordChange {
            identity: PendingIdentity {
                email: session.email,
            },
            api_key: api_key.to_string(),
        });
    }

    let marker = match fetch_marker(db, &session.email).await? {
        Some(m) => m,
        None => return Err(MarkingError::InvalidCredentials),
    };

    Ok(AuthUser::Active(RequestContext {
        identity: identity_of(&marker),
        api_key: api_key.to_string(),
    }))
}

/**
 * Get the user of a request from its `Authorization` header
 */
pub async fn get_user(req: &HttpRequest, con: &MarkingCon) -> Result<AuthUser, MarkingError> {
    let api_key = req2key(req)?;
    resolve_session(&con.database, &api_key, con.config.session_timeout_secs).await
}

/// like [`get_user`], but a pending password change is refused
pub async fn require_login(req: &HttpRequest, con: &MarkingCon) -> Result<RequestContext, MarkingError> {
    match get_user(req, con).await? {
        AuthUser::Active(ctx) => Ok(ctx),
        AuthUser::PendingPasswordChange { identity, .. } => {
            warn!("{} tried to skip the password change", identity.email);
            Err(MarkingError::access_denied(
                "Please change your password before continuing",
            ))
        }
    }
}

pub async fn require_admin(req: &HttpRequest, con: &MarkingCon) -> Result<RequestContext, MarkingError> {
    let ctx = require_login(req, con).await?;
    if !is_administrator(&ctx.identity) {
        return Err(MarkingError::access_denied("Only administrators may do this"));
    }
    Ok(ctx)
}
