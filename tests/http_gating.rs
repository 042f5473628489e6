use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::{test, web, App, HttpRequest, HttpResponse, ResponseError};
use marking_lib_derive::{ensure_admin, ensure_marker, ensure_user};
use markingLib::schema::UploadStudent;
use markingLib::{auth, manage, report, MarkingCon, MarkingConfig};
use serde::Deserialize;

const CAROL: &str = "carol@uni.ac.uk";

#[derive(Deserialize)]
struct PasswordChange {
    new_password: String,
    confirm_password: String,
}

#[ensure_marker]
async fn dashboard(req: HttpRequest, data: web::Data<MarkingCon>) -> HttpResponse {
    match report::dashboard(&ctx, &data.database).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => e.error_response(),
    }
}

#[ensure_admin]
async fn markers(req: HttpRequest, data: web::Data<MarkingCon>) -> HttpResponse {
    match report::list_markers(&ctx, &data.database).await {
        Ok(m) => HttpResponse::Ok().json(m),
        Err(e) => e.error_response(),
    }
}

#[ensure_user]
async fn change_password(
    req: HttpRequest,
    data: web::Data<MarkingCon>,
    body: web::Json<PasswordChange>,
) -> HttpResponse {
    match auth::change_password(&data.database, &user, &body.new_password, &body.confirm_password).await {
        Ok(_) => HttpResponse::Ok().finish(),
        Err(e) => e.error_response(),
    }
}

async fn setup() -> web::Data<MarkingCon> {
    let config = MarkingConfig {
        database_url: "sqlite::memory:".to_string(),
        ..Default::default()
    };
    let con = MarkingCon::open(&config).await.unwrap();

    manage::provision_marker(&con.database, CAROL, "Carol Carter", false)
        .await
        .unwrap();
    let result = manage::upload_students(
        &con.database,
        vec![UploadStudent {
            id: "10000003".to_string(),
            first_name: "Alan".to_string(),
            last_name: "Turing".to_string(),
            programme: "Computer Science".to_string(),
            first_marker: Some(CAROL.to_string()),
            second_marker: None,
        }],
    )
    .await
    .unwrap();
    assert_eq!(result.valid.len(), 1);

    web::Data::new(con)
}

fn bearer(key: &str) -> (actix_web::http::header::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {}", key))
}

#[actix_rt::test]
async fn first_login_must_change_password_before_anything_else() {
    let data = setup().await;
    let app = test::init_service(
        App::new()
            .app_data(data.clone())
            .route("/dashboard", web::get().to(dashboard))
            .route("/markers", web::get().to(markers))
            .route("/password", web::post().to(change_password)),
    )
    .await;

    // no key at all
    let req = test::TestRequest::get().uri("/dashboard").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let pending = auth::login(&data, CAROL, CAROL).await.unwrap();
    assert!(pending.must_change_password);

    let req = test::TestRequest::get()
        .uri("/dashboard")
        .insert_header(bearer(&pending.api_key))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/password")
        .insert_header(bearer(&pending.api_key))
        .set_json(serde_json::json!({"new_password": "short", "confirm_password": "short"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/password")
        .insert_header(bearer(&pending.api_key))
        .set_json(serde_json::json!({"new_password": "carol-secret", "confirm_password": "carol-secret"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    // the pending session is gone
    let req = test::TestRequest::get()
        .uri("/dashboard")
        .insert_header(bearer(&pending.api_key))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let active = auth::login(&data, CAROL, "carol-secret").await.unwrap();
    assert!(!active.must_change_password);

    let req = test::TestRequest::get()
        .uri("/dashboard")
        .insert_header(bearer(&active.api_key))
        .to_request();
    let rows: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(rows.as_array().map(|r| r.len()), Some(1));
    assert_eq!(rows[0]["student"]["id"], "10000003");

    // a marker is no administrator
    let req = test::TestRequest::get()
        .uri("/markers")
        .insert_header(bearer(&active.api_key))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
