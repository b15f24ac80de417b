//! Data Management API client
//!
//! Read-only access to the hub → project → folder → item hierarchy. Responses
//! are JSON:API documents; only the fields the browser needs are decoded.

use std::sync::Arc;

use aps_auth::CredentialProvider;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::tree::{TreeNode, TreeNodeId};
use crate::{Error, Result, bearer_header};

/// Default APS API host.
pub const DEFAULT_API_HOST: &str = "https://developer.api.autodesk.com";

/// A hub, project or folder: an id and the name shown in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub name: String,
}

/// A design file together with the URN of its viewable derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignItem {
    pub id: String,
    pub name: String,
    pub urn: String,
}

/// A folder listing split into sub-folders and design items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderContents {
    pub folders: Vec<Entry>,
    pub items: Vec<DesignItem>,
}

#[derive(Debug, Deserialize)]
struct Document {
    data: Vec<Resource>,
    #[serde(default)]
    included: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    relationships: Relationships,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    name: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Relationships {
    item: Option<Link>,
    derivatives: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    data: Option<LinkTarget>,
}

#[derive(Debug, Deserialize)]
struct LinkTarget {
    id: String,
}

impl Link {
    fn target(link: &Option<Link>) -> Option<&str> {
        link.as_ref()?.data.as_ref().map(|t| t.id.as_str())
    }
}

impl Resource {
    fn label(&self) -> String {
        self.attributes
            .display_name
            .clone()
            .or_else(|| self.attributes.name.clone())
            .unwrap_or_else(|| self.id.clone())
    }

    fn into_entry(self) -> Entry {
        Entry {
            name: self.label(),
            id: self.id,
        }
    }
}

impl Document {
    fn entries(self) -> Vec<Entry> {
        self.data.into_iter().map(Resource::into_entry).collect()
    }

    /// Split a folder listing, pairing each item with its derivative URN.
    ///
    /// The included version whose `item` relationship names the item wins;
    /// otherwise the version at the item's position is used. Items with no
    /// derivative are skipped.
    fn into_contents(self) -> FolderContents {
        let mut contents = FolderContents::default();
        let mut item_index = 0;
        for resource in &self.data {
            match resource.kind.as_str() {
                "folders" => contents.folders.push(Entry {
                    id: resource.id.clone(),
                    name: resource.label(),
                }),
                "items" => {
                    let by_relationship = self
                        .included
                        .iter()
                        .find(|v| Link::target(&v.relationships.item) == Some(resource.id.as_str()));
                    let version = by_relationship.or_else(|| self.included.get(item_index));
                    item_index += 1;
                    match version.and_then(|v| Link::target(&v.relationships.derivatives)) {
                        Some(urn) => contents.items.push(DesignItem {
                            id: resource.id.clone(),
                            name: resource.label(),
                            urn: urn.to_string(),
                        }),
                        None => warn!(item = %resource.id, "item has no derivative, skipping"),
                    }
                }
                other => debug!(kind = other, id = %resource.id, "ignoring folder entry"),
            }
        }
        contents
    }
}

/// Client for the Data Management endpoints, authenticated per call.
#[derive(Clone)]
pub struct DataManagementClient {
    client: reqwest::Client,
    host: Url,
    provider: Arc<dyn CredentialProvider>,
}

impl DataManagementClient {
    pub fn new(client: reqwest::Client, host: Url, provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client,
            host,
            provider,
        }
    }

    pub async fn hubs(&self) -> Result<Vec<Entry>> {
        let doc: Document = self.get(&["project", "v1", "hubs"]).await?;
        Ok(doc.entries())
    }

    pub async fn projects(&self, hub_id: &str) -> Result<Vec<Entry>> {
        let doc: Document = self
            .get(&["project", "v1", "hubs", hub_id, "projects"])
            .await?;
        Ok(doc.entries())
    }

    pub async fn top_folders(&self, hub_id: &str, project_id: &str) -> Result<Vec<Entry>> {
        let doc: Document = self
            .get(&[
                "project",
                "v1",
                "hubs",
                hub_id,
                "projects",
                project_id,
                "topFolders",
            ])
            .await?;
        Ok(doc.entries())
    }

    pub async fn folder_contents(&self, project_id: &str, folder_id: &str) -> Result<FolderContents> {
        let doc: Document = self
            .get(&[
                "data", "v1", "projects", project_id, "folders", folder_id, "contents",
            ])
            .await?;
        Ok(doc.into_contents())
    }

    /// Top level of the browser tree: one node per hub.
    pub async fn roots(&self) -> Result<Vec<TreeNode>> {
        Ok(self
            .hubs()
            .await?
            .into_iter()
            .map(|hub| TreeNode {
                id: TreeNodeId::Hub { hub: hub.id },
                label: hub.name,
            })
            .collect())
    }

    /// Expand one tree node. Items are leaves and expand to nothing.
    pub async fn children(&self, node: &TreeNodeId) -> Result<Vec<TreeNode>> {
        match node {
            TreeNodeId::Hub { hub } => Ok(self
                .projects(hub)
                .await?
                .into_iter()
                .map(|project| TreeNode {
                    id: TreeNodeId::Project {
                        hub: hub.clone(),
                        project: project.id,
                    },
                    label: project.name,
                })
                .collect()),
            TreeNodeId::Project { hub, project } => Ok(self
                .top_folders(hub, project)
                .await?
                .into_iter()
                .map(|folder| TreeNode {
                    id: TreeNodeId::Folder {
                        hub: hub.clone(),
                        project: project.clone(),
                        folder: folder.id,
                    },
                    label: folder.name,
                })
                .collect()),
            TreeNodeId::Folder {
                hub,
                project,
                folder,
            } => {
                let contents = self.folder_contents(project, folder).await?;
                let folders = contents.folders.into_iter().map(|f| TreeNode {
                    id: TreeNodeId::Folder {
                        hub: hub.clone(),
                        project: project.clone(),
                        folder: f.id,
                    },
                    label: f.name,
                });
                let items = contents.items.into_iter().map(|i| TreeNode {
                    id: TreeNodeId::Item {
                        hub: hub.clone(),
                        project: project.clone(),
                        item: i.id,
                        urn: i.urn,
                    },
                    label: i.name,
                });
                Ok(folders.chain(items).collect())
            }
            TreeNodeId::Item { .. } => Ok(Vec::new()),
        }
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let endpoint = segments.join("/");
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Http(format!("API host cannot be a base URL: {}", self.host)))?
            .pop_if_empty()
            .extend(segments);

        let credentials = self.provider.credentials().await?;
        debug!(%endpoint, "data management request");
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, bearer_header(&credentials)?)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{endpoint}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%endpoint, %status, "data management request failed");
            return Err(Error::Api {
                endpoint,
                status: status.to_string(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("{endpoint}: {e}")))
    }
}
