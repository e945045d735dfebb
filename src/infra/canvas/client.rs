use abet_artifacts::config::CanvasConfig;
use abet_artifacts::fetch::auth::ApiKey;
use abet_artifacts::fetch::{BasicClient, HttpClient, next_link};
use abet_artifacts::lms::{Assignment, AssignmentId, Course, FileInfo, Submission};
use abet_artifacts::services::LmsApi;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::LINK;
use reqwest::{Method, Request, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

type Query<'q> = [(&'q str, String)];

/// Canvas REST client. Every request is authenticated with the configured
/// access token and preceded by the configured delay.
#[derive(Clone)]
pub struct CanvasClient<C = ApiKey<BasicClient>> {
    http: C,
    /// Unauthenticated client, for requests whose body is built with
    /// reqwest's builder or that go to upload hosts.
    plain: reqwest::Client,
    config: CanvasConfig,
}

impl CanvasClient<ApiKey<BasicClient>> {
    pub fn new(config: CanvasConfig) -> Result<Self> {
        let basic = BasicClient::with_timeout(config.timeout)?;
        let plain = basic.inner().clone();
        let http = ApiKey::bearer(basic, &config.access_token)?;

        Ok(Self {
            http,
            plain,
            config,
        })
    }
}

impl<C: HttpClient> CanvasClient<C> {
    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn plain(&self) -> &reqwest::Client {
        &self.plain
    }

    async fn send(&self, req: Request) -> Result<Response> {
        tokio::time::sleep(self.config.request_delay).await;

        let method = req.method().clone();
        let url = req.url().clone();
        let resp = self
            .http
            .execute(req)
            .await
            .with_context(|| format!("{method} {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{method} {url} returned status {status}: {body}");
        }
        Ok(resp)
    }

    fn get_request(&self, path: &str, query: &Query<'_>) -> Result<Request> {
        let mut url = Url::parse(&self.config.endpoint(path))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(Request::new(Method::GET, url))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &Query<'_>) -> Result<T> {
        let resp = self.send(self.get_request(path, query)?).await?;
        resp.json()
            .await
            .with_context(|| format!("parsing response of {path}"))
    }

    /// Fetches every page of a list endpoint, following `Link: rel="next"`.
    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query<'_>,
    ) -> Result<Vec<T>> {
        let mut query = query.to_vec();
        query.push(("per_page", self.config.per_page.to_string()));

        let mut next = Some(self.config.endpoint(path));
        let mut items = Vec::new();
        let mut pages = 0;

        while let Some(url) = next {
            let resp = self.send(self.get_request(&url, &query)?).await?;
            next = resp
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link);

            let page: Vec<T> = resp
                .json()
                .await
                .with_context(|| format!("parsing page {} of {path}", pages + 1))?;
            items.extend(page);
            pages += 1;

            // The next link already carries every query parameter.
            query.clear();
        }

        debug!(path, pages, items = items.len(), "Paginated list fetched");
        Ok(items)
    }

    /// POSTs a url-encoded form to an API endpoint and returns the JSON reply.
    pub async fn post_form(&self, path: &str, form: &Query<'_>) -> Result<serde_json::Value> {
        let req = self
            .plain
            .post(self.config.endpoint(path))
            .form(form)
            .build()?;
        let resp = self.send(req).await?;
        resp.json()
            .await
            .with_context(|| format!("parsing response of {path}"))
    }

    /// POSTs a JSON body to an API endpoint and decodes the reply.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let req = self
            .plain
            .post(self.config.endpoint(path))
            .json(body)
            .build()?;
        let resp = self.send(req).await?;
        resp.json()
            .await
            .with_context(|| format!("parsing response of {path}"))
    }
}

#[async_trait]
impl<C: HttpClient> LmsApi for CanvasClient<C> {
    async fn get_course(&self, course_id: u64) -> Result<Course> {
        let raw: serde_json::Value = self
            .get_json(
                &format!("courses/{course_id}"),
                &[
                    ("include[]", "syllabus_body".to_string()),
                    ("include[]", "term".to_string()),
                ],
            )
            .await?;
        Ok(Course::from_value(raw)?)
    }

    async fn list_assignments(&self, course_id: u64) -> Result<Vec<Assignment>> {
        let assignments: Vec<Assignment> = self
            .get_paginated(
                &format!("courses/{course_id}/assignments"),
                &[("include[]", "rubric".to_string())],
            )
            .await?;
        debug!(course_id, count = assignments.len(), "Assignments fetched");
        Ok(assignments)
    }

    async fn list_submissions(
        &self,
        course_id: u64,
        assignment_id: AssignmentId,
    ) -> Result<Vec<Submission>> {
        let submissions: Vec<Submission> = self
            .get_paginated(
                &format!("courses/{course_id}/assignments/{assignment_id}/submissions"),
                &[
                    ("include[]", "user".to_string()),
                    ("include[]", "rubric_assessment".to_string()),
                    ("include[]", "full_rubric_assessment".to_string()),
                ],
            )
            .await?;
        debug!(assignment_id, count = submissions.len(), "Submissions fetched");
        Ok(submissions)
    }

    async fn get_file(&self, file_id: u64) -> Result<FileInfo> {
        self.get_json(&format!("files/{file_id}"), &[]).await
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        let resp = self.send(self.get_request(url, &[])?).await?;
        Ok(resp.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CanvasClient {
        CanvasClient::new(CanvasConfig::new("canvas.example.edu", "token".to_string())).unwrap()
    }

    #[test]
    fn test_get_request_adds_query() {
        let req = client()
            .get_request(
                "courses/5/assignments",
                &[("include[]", "rubric".to_string()), ("per_page", "100".to_string())],
            )
            .unwrap();

        assert_eq!(
            req.url().as_str(),
            "https://canvas.example.edu/api/v1/courses/5/assignments?include%5B%5D=rubric&per_page=100"
        );
    }

    #[test]
    fn test_get_request_keeps_absolute_url() {
        let next = "https://canvas.example.edu/api/v1/courses/5/assignments?page=2&per_page=100";
        let req = client().get_request(next, &[]).unwrap();

        assert_eq!(req.url().as_str(), next);
    }
}
