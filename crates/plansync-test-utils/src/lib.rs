//! Testing utilities for plansync workspace
//!
//! Shared fixtures and an in-memory remote service with failure injection.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use plansync_model::{PlanDocument, ProjectId, ProjectMetadata, UserId};
use plansync_remote::{
    CreateProjectRequest, ImportProjectRequest, RemoteBackend, RemoteError, RemoteProject,
    UpdateProjectRequest,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

pub fn sample_document_value(tasks: usize) -> Value {
    let tasks: Vec<Value> = (0..tasks)
        .map(|i| json!({ "id": format!("task-{i}"), "title": format!("Task {i}"), "lane": "lane-1" }))
        .collect();
    json!({
        "version": 1,
        "tasks": tasks,
        "swimlanes": [{ "id": "lane-1", "name": "Engineering" }],
        "camera": { "x": 0.0, "y": 0.0, "zoom": 1.0 }
    })
}

/// Valid document with `tasks` work items and one swimlane
pub fn sample_document(tasks: usize) -> PlanDocument {
    PlanDocument::from_value(sample_document_value(tasks)).unwrap()
}

pub fn sample_metadata(name: &str) -> ProjectMetadata {
    ProjectMetadata::new(name)
        .with_description("Quarterly roadmap")
        .with_tags(["planning"])
}

/// Remote call kinds counted by [`FakeRemote`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    Create,
    Update,
    Load,
    Delete,
    ListForUser,
    ListPublic,
    Import,
}

const CALL_KINDS: usize = 7;

/// In-memory project service
///
/// Enforces ownership like the real service: update/delete by a user other
/// than the owner answer 403, as does loading someone else's private project.
/// Imports are not deduplicated server side.
#[derive(Debug, Default)]
pub struct FakeRemote {
    projects: DashMap<ProjectId, RemoteProject>,
    offline: AtomicBool,
    injected: Mutex<Option<RemoteError>>,
    next_id: AtomicU64,
    calls: [AtomicUsize; CALL_KINDS],
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a transport error while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every call fails with `error` until cleared with `None`
    pub fn fail_with(&self, error: Option<RemoteError>) {
        *self.injected.lock() = error;
    }

    pub fn calls(&self, kind: RemoteCall) -> usize {
        self.calls[kind as usize].load(Ordering::SeqCst)
    }

    pub fn project(&self, id: &ProjectId) -> Option<RemoteProject> {
        self.projects.get(id).map(|p| p.value().clone())
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Seed a full project owned by `owner`
    pub fn insert(&self, id: &str, owner: &UserId, is_public: bool, document: &PlanDocument) {
        let now = Utc::now();
        self.projects.insert(
            ProjectId::new(id),
            RemoteProject {
                id: ProjectId::new(id),
                user_id: owner.clone(),
                name: id.to_string(),
                description: String::new(),
                is_public,
                tags: Vec::new(),
                project_data: Some(document.to_value().unwrap()),
                created_at: Some(now),
                updated_at: Some(now),
            },
        );
    }

    fn enter(&self, kind: RemoteCall) -> Result<(), RemoteError> {
        self.calls[kind as usize].fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        match self.injected.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn store_new(&self, request: &CreateProjectRequest) -> ProjectId {
        let id = ProjectId::new(format!(
            "srv-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        ));
        let now = Utc::now();
        self.projects.insert(
            id.clone(),
            RemoteProject {
                id: id.clone(),
                user_id: request.user_id.clone(),
                name: request.name.clone(),
                description: request.description.clone(),
                is_public: request.is_public,
                tags: request.tags.clone(),
                project_data: Some(request.project_data.clone()),
                created_at: Some(now),
                updated_at: Some(now),
            },
        );
        id
    }

    fn check_owner(project: &RemoteProject, user: &UserId) -> Result<(), RemoteError> {
        if project.user_id == *user || project.user_id.is_anonymous() {
            Ok(())
        } else {
            Err(RemoteError::Forbidden("not the owner".to_string()))
        }
    }
}

fn summary_of(project: &RemoteProject) -> RemoteProject {
    RemoteProject {
        project_data: None,
        ..project.clone()
    }
}

#[async_trait]
impl RemoteBackend for FakeRemote {
    async fn create(&self, request: &CreateProjectRequest) -> Result<ProjectId, RemoteError> {
        self.enter(RemoteCall::Create)?;
        Ok(self.store_new(request))
    }

    async fn update(
        &self,
        id: &ProjectId,
        request: &UpdateProjectRequest,
    ) -> Result<(), RemoteError> {
        self.enter(RemoteCall::Update)?;
        let mut entry = self.projects.get_mut(id).ok_or(RemoteError::NotFound)?;
        let project = entry.value_mut();
        Self::check_owner(project, &request.user_id)?;
        project.name = request.name.clone();
        project.description = request.description.clone();
        project.is_public = request.is_public;
        project.tags = request.tags.clone();
        project.project_data = Some(request.project_data.clone());
        project.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn load(&self, id: &ProjectId, user: &UserId) -> Result<RemoteProject, RemoteError> {
        self.enter(RemoteCall::Load)?;
        let project = self.project(id).ok_or(RemoteError::NotFound)?;
        if !project.is_public {
            Self::check_owner(&project, user)?;
        }
        Ok(project)
    }

    async fn delete(&self, id: &ProjectId, user: &UserId) -> Result<(), RemoteError> {
        self.enter(RemoteCall::Delete)?;
        let project = self.project(id).ok_or(RemoteError::NotFound)?;
        Self::check_owner(&project, user)?;
        self.projects.remove(id);
        Ok(())
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<RemoteProject>, RemoteError> {
        self.enter(RemoteCall::ListForUser)?;
        let mut list: Vec<RemoteProject> = self
            .projects
            .iter()
            .filter(|p| p.user_id == *user)
            .map(|p| summary_of(p.value()))
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn list_public(&self) -> Result<Vec<RemoteProject>, RemoteError> {
        self.enter(RemoteCall::ListPublic)?;
        let mut list: Vec<RemoteProject> = self
            .projects
            .iter()
            .filter(|p| p.is_public)
            .map(|p| summary_of(p.value()))
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn import(&self, request: &ImportProjectRequest) -> Result<ProjectId, RemoteError> {
        self.enter(RemoteCall::Import)?;
        Ok(self.store_new(&request.project))
    }
}
