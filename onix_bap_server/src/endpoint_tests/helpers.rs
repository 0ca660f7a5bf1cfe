use actix_web::{error::ResponseError, http::StatusCode, test, web::ServiceConfig, App};
use serde_json::Value;

/// Runs one POST against a freshly configured test app and returns status + parsed JSON body.
/// Handler errors are rendered through their `ResponseError` implementation, exactly as the
/// running server would.
pub async fn post_json<F>(path: &str, body: Value, headers: &[(&str, &str)], configure: F) -> (StatusCode, Value)
where F: FnOnce(&mut ServiceConfig) {
    let app = test::init_service(App::new().configure(configure)).await;
    let mut request = test::TestRequest::post().uri(path).set_json(&body);
    for (name, value) in headers {
        request = request.insert_header((*name, *value));
    }
    match test::try_call_service(&app, request.to_request()).await {
        Ok(response) => {
            let status = response.status();
            let bytes = test::read_body(response).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        },
        Err(e) => read_error_response(e).await,
    }
}

pub async fn get_json<F>(path: &str, configure: F) -> (StatusCode, Value)
where F: FnOnce(&mut ServiceConfig) {
    let app = test::init_service(App::new().configure(configure)).await;
    let request = test::TestRequest::get().uri(path).to_request();
    match test::try_call_service(&app, request).await {
        Ok(response) => {
            let status = response.status();
            let bytes = test::read_body(response).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        },
        Err(e) => read_error_response(e).await,
    }
}

async fn read_error_response(e: actix_web::Error) -> (StatusCode, Value) {
    let response = e.as_response_error().error_response();
    let status = response.status();
    let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap_or_default();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
