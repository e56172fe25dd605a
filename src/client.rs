use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::models::{
    Acknowledgement, AnalysisResult, ApplicationRecord, ApplicationSubmission, JobOpening,
    ProfileUpdate, ResumeUpload, StudentProfile,
};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn fetch_analysis(&self, opening_id: i64) -> Result<AnalysisResult, RemoteError>;

    /// Only call when the analysis carried an artifact reference.
    async fn fetch_artifact(&self, opening_id: i64) -> Result<Bytes, RemoteError>;

    async fn submit_application(
        &self,
        opening_id: i64,
        submission: &ApplicationSubmission,
    ) -> Result<Acknowledgement, RemoteError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Deserialize)]
struct CoverLetterResponse {
    cover_letter: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct PortalClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl PortalClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "request");
        let request = self.client.request(method, &url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        check_status(request.send().await?).await
    }

    async fn get(&self, path: &str) -> Result<Response, RemoteError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn available_openings(&self) -> Result<Vec<JobOpening>, RemoteError> {
        Ok(self.get("student/drives/available").await?.json().await?)
    }

    pub async fn my_applications(&self) -> Result<Vec<ApplicationRecord>, RemoteError> {
        Ok(self.get("student/applications").await?.json().await?)
    }

    pub async fn cover_letter(&self, opening_id: i64) -> Result<String, RemoteError> {
        let body: CoverLetterResponse = self
            .get(&format!("ai/generate-cover-letter/{}", opening_id))
            .await?
            .json()
            .await?;
        Ok(body.cover_letter)
    }

    pub async fn current_user(&self) -> Result<CurrentUser, RemoteError> {
        Ok(self.get("auth/me").await?.json().await?)
    }

    pub async fn profile(&self) -> Result<StudentProfile, RemoteError> {
        Ok(self.get("student/profile").await?.json().await?)
    }

    fn profile_update_request(&self, update: &ProfileUpdate) -> RequestBuilder {
        self.request(Method::PUT, "student/profile").json(update)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<String, RemoteError> {
        let body: MessageResponse = self
            .send(self.profile_update_request(update))
            .await?
            .json()
            .await?;
        Ok(body.message)
    }

    fn resume_upload_request(
        &self,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<RequestBuilder, RemoteError> {
        let part = Part::bytes(contents)
            .file_name(filename.to_string())
            .mime_str(resume_mime(filename))?;
        Ok(self
            .request(Method::POST, "student/resume")
            .multipart(Form::new().part("file", part)))
    }

    pub async fn upload_resume(
        &self,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<ResumeUpload, RemoteError> {
        let request = self.resume_upload_request(filename, contents)?;
        Ok(self.send(request).await?.json().await?)
    }

    fn offer_letter_request(&self, application_id: i64) -> RequestBuilder {
        self.request(
            Method::GET,
            &format!("student/applications/{}/offer-letter", application_id),
        )
    }

    pub async fn offer_letter(&self, application_id: i64) -> Result<Bytes, RemoteError> {
        let response = self.send(self.offer_letter_request(application_id)).await?;
        Ok(response.bytes().await?)
    }
}

fn resume_mime(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("doc") => "application/msword",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl AnalysisClient for PortalClient {
    async fn fetch_analysis(&self, opening_id: i64) -> Result<AnalysisResult, RemoteError> {
        Ok(self
            .get(&format!("ai/analyze-job/{}", opening_id))
            .await?
            .json()
            .await?)
    }

    async fn fetch_artifact(&self, opening_id: i64) -> Result<Bytes, RemoteError> {
        let response = self
            .get(&format!("ai/personalized-resume/{}", opening_id))
            .await?;
        Ok(response.bytes().await?)
    }

    async fn submit_application(
        &self,
        opening_id: i64,
        submission: &ApplicationSubmission,
    ) -> Result<Acknowledgement, RemoteError> {
        let request = self
            .request(Method::POST, &format!("ai/apply/{}", opening_id))
            .json(submission);
        Ok(self.send(request).await?.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
    warn!(status = status.as_u16(), %message, "portal request failed");
    Err(classify_status(status, message))
}

fn classify_status(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            RemoteError::Validation(message)
        }
        _ => RemoteError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pulls the human-readable message out of an error body. The portal uses
/// `{"error": "..."}`; `{"error": {"message": ...}}` and `{"message": ...}`
/// are accepted too.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = match value.get("error") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    message
        .or_else(|| value.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error": "Already applied to this drive"}"#).as_deref(),
            Some("Already applied to this drive")
        );
        assert_eq!(
            extract_error_message(r#"{"error": {"code": "NOT_FOUND", "message": "missing"}}"#)
                .as_deref(),
            Some("missing")
        );
        assert_eq!(
            extract_error_message(r#"{"message": "Token has expired"}"#).as_deref(),
            Some("Token has expired")
        );
        assert_eq!(extract_error_message("<html>502</html>"), None);
        assert_eq!(extract_error_message(r#"{"error": ""}"#), None);
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "Personalized resume not generated yet".into()),
            RemoteError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "Please upload resume first".into()),
            RemoteError::Validation(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "No file uploaded".into()),
            RemoteError::Validation(msg) if msg == "No file uploaded"
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "Not Found".into()),
            RemoteError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "Profile not approved by HOD".into()),
            RemoteError::Server { status: 403, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, "Could not parse resume".into()),
            RemoteError::Server { status: 500, .. }
        ));
    }

    #[test]
    fn test_url_joining() {
        let client =
            PortalClient::new("http://localhost:5000/api/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url("/ai/analyze-job/4"),
            "http://localhost:5000/api/ai/analyze-job/4"
        );
        assert_eq!(
            client.url("student/drives/available"),
            "http://localhost:5000/api/student/drives/available"
        );
    }

    fn authed() -> PortalClient {
        PortalClient::new(
            "http://localhost:5000/api",
            Some("tok".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_resume_upload_request() {
        let request = authed()
            .resume_upload_request("Asha Resume.PDF", b"%PDF-1.4".to_vec())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.url().as_str(), "http://localhost:5000/api/student/resume");
        let content_type = request.headers()[reqwest::header::CONTENT_TYPE]
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert_eq!(request.headers()[reqwest::header::AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn test_offer_letter_request() {
        let request = authed().offer_letter_request(12).build().unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(
            request.url().as_str(),
            "http://localhost:5000/api/student/applications/12/offer-letter"
        );
        assert_eq!(request.headers()[reqwest::header::AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn test_profile_update_request() {
        let update = ProfileUpdate {
            cgpa: Some(8.9),
            ..Default::default()
        };
        let request = authed().profile_update_request(&update).build().unwrap();
        assert_eq!(request.method(), &Method::PUT);
        assert_eq!(request.url().as_str(), "http://localhost:5000/api/student/profile");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(body).unwrap(),
            serde_json::json!({ "cgpa": 8.9 })
        );
    }

    #[test]
    fn test_resume_mime() {
        assert_eq!(resume_mime("cv.pdf"), "application/pdf");
        assert!(resume_mime("CV.DOCX").ends_with("wordprocessingml.document"));
        assert_eq!(resume_mime("resume"), "application/octet-stream");
    }
}
