//! Setting up a marking database: creating and migrating it, provisioning
//! markers and loading the student list.

use crate::config::MarkingConfig;
use crate::error::MarkingError;
use crate::fields;
use crate::report::normalize;
use crate::schema::{self, ReportType, UploadStudent, UploadStudentResult};
use crate::MarkingCon;
use log::{debug, info, warn};
use sha256::digest;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool};
use std::collections::HashSet;

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/**
 * Connects to the database of `config` and brings its schema up to date.
 *
 * A missing database file is created when `create_if_missing` is set. An
 * in-memory database lives in exactly one connection that is never closed.
 */
pub async fn open(config: &MarkingConfig) -> Result<MarkingCon, MarkingError> {
    let db_url = config.database_url.as_str();
    let in_memory = is_in_memory(db_url);

    if !in_memory {
        let exists = match Sqlite::database_exists(db_url).await {
            Ok(e) => e,
            Err(e) => return Err(MarkingError::persistence("Couldnt check the database", e)),
        };
        if !exists {
            if !config.create_if_missing {
                return Err(MarkingError::not_found(format!(
                    "The database {} does not exist",
                    db_url
                )));
            }
            if let Err(e) = Sqlite::create_database(db_url).await {
                return Err(MarkingError::persistence("Couldnt create the database", e));
            }
            info!("created database {}", db_url);
        }
    }

    let options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };

    let database = match options.connect(db_url).await {
        Ok(p) => p,
        Err(e) => return Err(MarkingError::persistence("Couldnt connect to the database", e)),
    };
    migrate(&database).await?;

    Ok(MarkingCon {
        database,
        config: config.clone(),
    })
}

/// writes the database schema
pub async fn migrate(db: &SqlitePool) -> Result<(), MarkingError> {
    if let Err(e) = sqlx::migrate!("./migrations").run(db).await {
        return Err(MarkingError::persistence(
            "Error while migrating the database",
            sqlx::Error::from(e),
        ));
    }
    debug!("migrated database");
    Ok(())
}

/**
 * Adds a marker whose password is the hash of the email.
 *
 * The marker has to change it on the first login.
 */
pub async fn provision_marker(
    db: &SqlitePool,
    email: &str,
    name: &str,
    administrator: bool,
) -> Result<(), MarkingError> {
    let email = email.trim();
    let name = name.trim();
    if email.is_empty() || name.is_empty() {
        return Err(MarkingError::validation("A marker needs an email and a name"));
    }

    let existing: Option<String> = sqlx::query_scalar("SELECT Email FROM Marker WHERE Email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;
    if existing.is_some() {
        return Err(MarkingError::validation(format!(
            "The marker {} already exists",
            email
        )));
    }

    sqlx::query("INSERT INTO Marker(Email, Name, Password, Administrator) VALUES (?,?,?,?)")
        .bind(email)
        .bind(name)
        .bind(digest(email))
        .bind(administrator)
        .execute(db)
        .await?;

    info!("provisioned marker {}", email);
    Ok(())
}

async fn insert_student(db: &SqlitePool, student: &UploadStudent) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO Student(ID, FirstName, LastName, Programme, FirstMarker, SecondMarker) VALUES (?,?,?,?,?,?)
    "#,
    )
    .bind(student.id.trim())
    .bind(student.first_name.trim())
    .bind(student.last_name.trim())
    .bind(student.programme.trim())
    .bind(normalize(&student.first_marker))
    .bind(normalize(&student.second_marker))
    .execute(&mut *tx)
    .await?;

    for report_type in ReportType::ALL {
        sqlx::query(fields::insert_empty(report_type))
            .bind(student.id.trim())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await
}

/**
 * Inserts a list of students together with their two empty reports.
 *
 * Every student is checked and inserted on its own, the result tells which
 * of them made it and why the others did not.
 */
pub async fn upload_students(
    db: &SqlitePool,
    student_list: Vec<UploadStudent>,
) -> Result<UploadStudentResult, MarkingError> {
    let known: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT Email FROM Marker")
        .fetch_all(db)
        .await?
        .into_iter()
        .collect();

    let mut result = UploadStudentResult::default();
    for student in student_list.into_iter() {
        if !schema::is_valid_student_id(student.id.trim()) {
            result.id_invalid.push(student);
            continue;
        }

        let markers = [
            normalize(&student.first_marker),
            normalize(&student.second_marker),
        ];
        if markers
            .iter()
            .flatten()
            .any(|email| !known.contains(email))
        {
            result.marker_unknown.push(student);
            continue;
        }

        match insert_student(db, &student).await {
            Ok(_) => result.valid.push(student),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                result.id_conflict.push(student)
            }
            Err(e) => {
                return Err(MarkingError::persistence(
                    format!("Error while inserting student {}", student.id),
                    e,
                ))
            }
        }
    }

    if !result.id_conflict.is_empty() {
        warn!("{} students already existed", result.id_conflict.len());
    }
    info!("uploaded {} students", result.valid.len());
    Ok(result)
}
