//! GitHub GraphQL client for pinned repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::request::send_json;
use super::GitHubRepository;
use crate::cache::{FetchError, Fetcher};

/// GitHub's GraphQL endpoint
const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

const PINNED_REPOS_QUERY: &str = r#"query {
  viewer {
    pinnedItems(first: 6, types: REPOSITORY) {
      nodes {
        ... on Repository {
          name
          owner { login }
          primaryLanguage { name color }
          description
          updatedAt
          stargazerCount
          id
          url
        }
      }
    }
  }
}"#;

/// Credentials for the GitHub API
#[derive(Debug, Clone)]
pub struct GitHubCredentials {
    /// Personal access token with `read:user` scope
    pub token: String,
}

/// Client for the viewer's pinned repositories
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    credentials: GitHubCredentials,
    endpoint: String,
}

impl GitHubClient {
    /// Creates a client against the public GitHub API
    pub fn new(client: Client, credentials: GitHubCredentials) -> Self {
        Self {
            client,
            credentials,
            endpoint: GITHUB_GRAPHQL_URL.to_string(),
        }
    }

    /// Points the client at a different GraphQL endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Fetches the viewer's pinned repositories
    pub async fn fetch_pinned_repos(&self) -> Result<Vec<GitHubRepository>, FetchError> {
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.credentials.token)
            .json(&json!({ "query": PINNED_REPOS_QUERY }));

        let response: GraphQlResponse<PinnedItemsData> = send_json(request).await?;
        let data = response.into_data()?;

        Ok(data
            .viewer
            .pinned_items
            .nodes
            .into_iter()
            .flatten()
            .map(RepositoryNode::into_repository)
            .collect())
    }
}

#[async_trait]
impl Fetcher for GitHubClient {
    type Data = Vec<GitHubRepository>;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        self.fetch_pinned_repos().await
    }
}

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl<T> GraphQlResponse<T> {
    fn into_data(self) -> Result<T, FetchError> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::Upstream(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| FetchError::MissingField("data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct PinnedItemsData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Viewer {
    pinned_items: PinnedItems,
}

#[derive(Debug, Deserialize)]
struct PinnedItems {
    nodes: Vec<Option<RepositoryNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name: String,
    owner: Owner,
    primary_language: Option<Language>,
    description: Option<String>,
    updated_at: DateTime<Utc>,
    stargazer_count: u32,
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Language {
    name: String,
    color: Option<String>,
}

impl RepositoryNode {
    fn into_repository(self) -> GitHubRepository {
        let (language, language_color) = match self.primary_language {
            Some(language) => (language.name, language.color.unwrap_or_default()),
            None => (String::new(), String::new()),
        };
        GitHubRepository {
            name: self.name,
            owner: self.owner.login,
            language,
            language_color,
            description: self.description.unwrap_or_default(),
            updated_at: self.updated_at,
            stargazers: self.stargazer_count,
            id: self.id,
            url: self.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ErrorClass;
    use crate::data::request::http_client;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PINNED_RESPONSE: &str = r##"{
        "data": {
            "viewer": {
                "pinnedItems": {
                    "nodes": [
                        {
                            "name": "lcp",
                            "owner": { "login": "octocat" },
                            "primaryLanguage": { "name": "Rust", "color": "#dea584" },
                            "description": "Activity cache",
                            "updatedAt": "2024-07-15T14:00:00Z",
                            "stargazerCount": 12,
                            "id": "R_kgDOabc",
                            "url": "https://github.com/octocat/lcp"
                        },
                        {
                            "name": "dotfiles",
                            "owner": { "login": "octocat" },
                            "primaryLanguage": null,
                            "description": null,
                            "updatedAt": "2024-06-01T09:30:00Z",
                            "stargazerCount": 0,
                            "id": "R_kgDOdef",
                            "url": "https://github.com/octocat/dotfiles"
                        },
                        null
                    ]
                }
            }
        }
    }"##;

    fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::new(
            http_client().unwrap(),
            GitHubCredentials {
                token: "test-token".to_string(),
            },
        )
        .with_endpoint(format!("{}/graphql", server.uri()))
    }

    #[tokio::test]
    async fn test_fetch_pinned_repos() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PINNED_RESPONSE))
            .mount(&server)
            .await;

        let repos = client_for(&server).fetch().await.unwrap();

        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "lcp");
        assert_eq!(repos[0].owner, "octocat");
        assert_eq!(repos[0].language, "Rust");
        assert_eq!(repos[0].language_color, "#dea584");
        assert_eq!(repos[0].stargazers, 12);
        assert_eq!(repos[1].language, "");
        assert_eq!(repos[1].description, "");
    }

    #[tokio::test]
    async fn test_graphql_errors_are_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": null, "errors": [{"message": "Bad credentials"}]}"#,
            ))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch().await.unwrap_err();

        assert!(err.to_string().contains("Bad credentials"));
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[tokio::test]
    async fn test_bad_gateway_is_ignorable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch().await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Ignorable);
    }
}
