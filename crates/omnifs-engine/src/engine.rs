//! The engine value.
//!
//! One [`Engine`] replaces the original system's global singletons: it owns
//! the open container, the session map, and the event ring, and turns
//! decoded requests into responses. It is intentionally `&mut self` all the
//! way down; the pipeline guarantees that exactly one worker thread ever
//! holds it.

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::events::{EventLevel, EventLog, EventRecord};
use crate::session::SessionManager;
use crate::unix_now;
use crate::{auth, fs, users};
use omnifs_container::OmniStore;
use omnifs_protocol::{
    Operation, QueueStats, Request, Response, ResponsePayload, Role, SessionInfo, Stats,
};
use std::path::Path;
use std::sync::Arc;

/// Identity a request executes under.
struct Caller {
    username: String,
    role: Role,
    owner_id: u32,
}

/// The container engine.
pub struct Engine {
    store: OmniStore,
    sessions: SessionManager,
    events: Arc<EventLog>,
    require_auth: bool,
    /// Latched when corruption is observed; mutations are refused until the
    /// container is reopened.
    read_only: bool,
}

impl Engine {
    /// Formats a fresh container at `path` and opens it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the container
    /// cannot be written.
    pub fn format(config: &Config, path: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(omnifs_container::ContainerError::Io)?;
            }
        }
        let store = OmniStore::format(path, &config.format_options())?;
        Self::finish_open(config, store)
    }

    /// Opens an existing container at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails validation.
    pub fn open(config: &Config, path: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        let store = OmniStore::open(path)?;
        Self::finish_open(config, store)
    }

    /// Opens `path`, formatting it first if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if neither opening nor formatting succeeds.
    pub fn open_or_format(config: &Config, path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(config, path)
        } else {
            Self::format(config, path)
        }
    }

    fn finish_open(config: &Config, mut store: OmniStore) -> Result<Self> {
        users::ensure_admin(&mut store, &config.admin_username, &config.admin_password)?;
        Ok(Self {
            store,
            sessions: SessionManager::new(config.session_timeout),
            events: Arc::new(EventLog::default()),
            require_auth: config.require_auth,
            read_only: false,
        })
    }

    /// Flushes and closes the container.
    ///
    /// # Errors
    ///
    /// Returns an error if a region cannot be written back.
    pub fn close(self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }

    /// The engine's event log.
    #[must_use]
    pub fn events(&self) -> Arc<EventLog> {
        Arc::clone(&self.events)
    }

    /// Direct store access for inspection and tests.
    #[must_use]
    pub fn store(&self) -> &OmniStore {
        &self.store
    }

    /// True once corruption has latched the engine read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Executes one request and produces its response. Timing fields are
    /// filled in by the pipeline worker.
    pub fn dispatch(&mut self, request: Request, queue: QueueStats) -> Response {
        let id = request.id;
        let kind = request.op.kind();

        let caller = match self.authenticate(&request.session, &request.op) {
            Ok(caller) => caller,
            Err(e) => {
                self.emit_failure(kind, "", "", &e);
                return Response::failure(id, e.status(), e.to_string());
            }
        };

        if self.read_only && request.op.is_mutation() {
            let e = EngineError::InvalidOperation(
                "container is read-only after corruption; reopen to recover".to_string(),
            );
            self.emit_failure(kind, "", &caller.username, &e);
            return Response::failure(id, e.status(), e.to_string());
        }

        let target = Self::target_of(&request.op);
        match self.execute(&request.session, &caller, request.op, queue) {
            Ok(payload) => {
                let user = if caller.username.is_empty() {
                    "system".to_string()
                } else {
                    caller.username
                };
                self.events.emit(EventRecord::new(
                    EventLevel::Info,
                    "engine",
                    kind.to_string(),
                    format!("{target} [OK]"),
                    user,
                ));
                Response::success(id, payload)
            }
            Err(e) => {
                if e.is_corrupt() {
                    self.read_only = true;
                    tracing::error!(%e, "corruption detected, engine is now read-only");
                }
                self.emit_failure(kind, &target, &caller.username, &e);
                Response::failure(id, e.status(), e.to_string())
            }
        }
    }

    fn authenticate(&mut self, session_id: &str, op: &Operation) -> Result<Caller> {
        if matches!(op, Operation::Login { .. }) {
            return Ok(Caller {
                username: String::new(),
                role: Role::Normal,
                owner_id: 0,
            });
        }
        if !self.require_auth {
            return Ok(Caller {
                username: "system".to_string(),
                role: Role::Admin,
                owner_id: 0,
            });
        }

        let now = unix_now();
        let (username, role) = {
            let session = self.sessions.validate(session_id, now)?;
            (session.username.clone(), session.role)
        };
        self.sessions.touch(session_id, now);

        if op.requires_admin() && role != Role::Admin {
            return Err(EngineError::PermissionDenied(format!(
                "{} requires the admin role",
                op.kind()
            )));
        }

        let owner_id = self
            .store
            .users()
            .slot_of(&username)
            .map(|slot| slot as u32)
            .unwrap_or(0);
        Ok(Caller {
            username,
            role,
            owner_id,
        })
    }

    fn execute(
        &mut self,
        session_id: &str,
        caller: &Caller,
        op: Operation,
        queue: QueueStats,
    ) -> Result<ResponsePayload> {
        match op {
            Operation::Login { username, password } => self.login(&username, &password),
            Operation::Logout => {
                self.sessions.remove(session_id)?;
                Ok(ResponsePayload::None)
            }
            Operation::CreateUser {
                username,
                password,
                role,
            } => {
                users::create_user(&mut self.store, &username, &password, role)?;
                Ok(ResponsePayload::None)
            }
            Operation::DeleteUser { username } => {
                if username == caller.username {
                    return Err(EngineError::InvalidOperation(
                        "a user cannot delete itself".to_string(),
                    ));
                }
                users::delete_user(&mut self.store, &username)?;
                self.sessions.remove_user_sessions(&username);
                Ok(ResponsePayload::None)
            }
            Operation::ListUsers => Ok(ResponsePayload::Users(users::list_users(&self.store))),
            Operation::FileCreate { path, data } => {
                fs::file_create(&mut self.store, &path, &data, caller.owner_id)?;
                Ok(ResponsePayload::None)
            }
            Operation::FileRead { path } => {
                Ok(ResponsePayload::Data(fs::file_read(&mut self.store, &path)?))
            }
            Operation::FileEdit { path, data, offset } => {
                fs::file_edit(&mut self.store, &path, &data, offset)?;
                Ok(ResponsePayload::None)
            }
            Operation::FileDelete { path } => {
                fs::file_delete(&mut self.store, &path)?;
                Ok(ResponsePayload::None)
            }
            Operation::FileTruncate { path } => {
                fs::file_truncate(&mut self.store, &path)?;
                Ok(ResponsePayload::None)
            }
            Operation::FileExists { path } => {
                Ok(ResponsePayload::Exists(fs::file_exists(&self.store, &path)?))
            }
            Operation::FileRename { old_path, new_path } => {
                fs::file_rename(&mut self.store, &old_path, &new_path)?;
                Ok(ResponsePayload::None)
            }
            Operation::DirCreate { path } => {
                fs::dir_create(&mut self.store, &path, caller.owner_id)?;
                Ok(ResponsePayload::None)
            }
            Operation::DirList { path } => {
                Ok(ResponsePayload::Entries(fs::dir_list(&self.store, &path)?))
            }
            Operation::DirDelete { path } => {
                fs::dir_delete(&mut self.store, &path)?;
                Ok(ResponsePayload::None)
            }
            Operation::DirExists { path } => {
                Ok(ResponsePayload::Exists(fs::dir_exists(&self.store, &path)?))
            }
            Operation::GetMetadata { path } => Ok(ResponsePayload::Metadata(fs::get_metadata(
                &self.store,
                &path,
            )?)),
            Operation::SetPermissions { path, mode } => {
                fs::set_permissions(&mut self.store, &path, mode)?;
                Ok(ResponsePayload::None)
            }
            Operation::GetStats => Ok(ResponsePayload::Stats(Stats {
                store: fs::stats(&self.store),
                queue,
            })),
        }
    }

    fn login(&mut self, username: &str, password: &str) -> Result<ResponsePayload> {
        let record = self
            .store
            .users()
            .get(username)
            .ok_or_else(|| EngineError::NotFound(format!("user {username}")))?
            .clone();

        if !auth::verify_password(password, &record.password_hash) {
            return Err(EngineError::PermissionDenied(
                "invalid username or password".to_string(),
            ));
        }

        let now = unix_now();
        let mut updated = record.clone();
        updated.last_login = now;
        self.store.users_mut().update(updated)?;
        self.store.persist_users()?;

        let session = self
            .sessions
            .create(username, Role::from_u32(record.role), now);
        Ok(ResponsePayload::Session(SessionInfo {
            session_id: session.session_id,
            username: session.username,
            role: session.role,
            expires_at: session.expiration_time,
        }))
    }

    fn target_of(op: &Operation) -> String {
        match op {
            Operation::Login { username, .. }
            | Operation::CreateUser { username, .. }
            | Operation::DeleteUser { username } => username.clone(),
            Operation::Logout | Operation::ListUsers | Operation::GetStats => String::new(),
            Operation::FileCreate { path, .. }
            | Operation::FileRead { path }
            | Operation::FileEdit { path, .. }
            | Operation::FileDelete { path }
            | Operation::FileTruncate { path }
            | Operation::FileExists { path }
            | Operation::DirCreate { path }
            | Operation::DirList { path }
            | Operation::DirDelete { path }
            | Operation::DirExists { path }
            | Operation::GetMetadata { path }
            | Operation::SetPermissions { path, .. } => path.clone(),
            Operation::FileRename { old_path, new_path } => {
                format!("{old_path} -> {new_path}")
            }
        }
    }

    fn emit_failure(
        &self,
        kind: omnifs_protocol::OpKind,
        target: &str,
        username: &str,
        error: &EngineError,
    ) {
        let user = if username.is_empty() { "system" } else { username };
        self.events.emit(EventRecord::new(
            EventLevel::Warn,
            "engine",
            kind.to_string(),
            format!("{target} [FAILED] {error}"),
            user,
        ));
    }
}
