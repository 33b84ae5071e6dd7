//! Browser `fetch` calls against the task API.

use serde::de::DeserializeOwned;
use shared::{CreateTaskRequest, DeleteTaskResponse, ErrorBody, Task, UpdateTaskRequest};
use uuid::Uuid;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys::{window, Request, RequestInit, Response};

use crate::error::ClientError;

/// Local storage key the sign-in page leaves the session token under.
const SESSION_KEY: &str = "session_token";

pub fn session_token() -> Option<String> {
    window()?
        .local_storage()
        .ok()??
        .get_item(SESSION_KEY)
        .ok()?
        .filter(|token| !token.is_empty())
}

/// Drops the stored session token; later requests go out anonymous.
pub fn clear_session() {
    let storage = window().and_then(|w| w.local_storage().ok().flatten());
    if let Some(storage) = storage {
        let _ = storage.remove_item(SESSION_KEY);
    }
}

fn js_error(err: JsValue) -> ClientError {
    ClientError::Network(format!("{:?}", err))
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ClientError> {
    serde_json::from_str(text).map_err(|e| ClientError::Decode(e.to_string()))
}

async fn send(method: &str, url: &str, body: Option<String>) -> Result<String, ClientError> {
    let window = window().ok_or_else(|| ClientError::Network("no window".to_string()))?;

    let opts = RequestInit::new();
    opts.set_method(method);
    if let Some(body) = &body {
        opts.set_body(&JsValue::from_str(body));
    }

    let request = Request::new_with_str_and_init(url, &opts).map_err(js_error)?;
    let headers = request.headers();
    if body.is_some() {
        headers.set("Content-Type", "application/json").map_err(js_error)?;
    }
    if let Some(token) = session_token() {
        headers
            .set("Authorization", &format!("Bearer {}", token))
            .map_err(js_error)?;
    }

    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_error)?
        .into();

    let text_promise = response.text().map_err(js_error)?;
    let text = JsFuture::from(text_promise)
        .await
        .map_err(js_error)?
        .as_string()
        .unwrap_or_default();

    if !response.ok() {
        let message = serde_json::from_str::<ErrorBody>(&text).ok().map(|body| body.error);
        return Err(ClientError::Http {
            status: response.status(),
            message,
        });
    }
    Ok(text)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, ClientError> {
    serde_json::to_string(value).map_err(|e| ClientError::Decode(e.to_string()))
}

pub async fn fetch_tasks() -> Result<Vec<Task>, ClientError> {
    let text = send("GET", "/api/tasks", None).await?;
    decode(&text)
}

pub async fn create_task(request: &CreateTaskRequest) -> Result<Task, ClientError> {
    let text = send("POST", "/api/tasks", Some(encode(request)?)).await?;
    decode(&text)
}

pub async fn update_task(request: &UpdateTaskRequest) -> Result<Task, ClientError> {
    let text = send("PUT", "/api/tasks", Some(encode(request)?)).await?;
    decode(&text)
}

pub async fn delete_task(id: Uuid) -> Result<DeleteTaskResponse, ClientError> {
    let text = send("DELETE", &format!("/api/{}", id), None).await?;
    decode(&text)
}
