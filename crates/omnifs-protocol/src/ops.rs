//! Operations and their arguments.

use serde::{Deserialize, Serialize};

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular user.
    Normal,
    /// Administrator: may manage users.
    Admin,
}

impl Role {
    /// Returns the on-disk value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Admin => 1,
        }
    }

    /// Converts an on-disk value back to a role. Unknown values read as
    /// `Normal` so a damaged role byte never grants admin rights.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Admin,
            _ => Self::Normal,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A single engine operation together with its arguments.
///
/// This is the decoded form of a request: front-ends parse whatever framing
/// they use into one of these variants before enqueueing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Authenticate and open a session.
    Login { username: String, password: String },
    /// Close the calling session.
    Logout,
    /// Create a user (admin only).
    CreateUser {
        username: String,
        password: String,
        role: Role,
    },
    /// Deactivate a user (admin only).
    DeleteUser { username: String },
    /// List active users (admin only).
    ListUsers,
    /// Create a file, optionally with initial content.
    FileCreate { path: String, data: Vec<u8> },
    /// Read a whole file.
    FileRead { path: String },
    /// Overwrite part of a file starting at `offset`, extending it if needed.
    FileEdit {
        path: String,
        data: Vec<u8>,
        offset: u64,
    },
    /// Delete a file.
    FileDelete { path: String },
    /// Drop a file's content, keeping the entry.
    FileTruncate { path: String },
    /// Check whether a path resolves.
    FileExists { path: String },
    /// Rename an entry in place (the parent directory cannot change).
    FileRename { old_path: String, new_path: String },
    /// Create a directory.
    DirCreate { path: String },
    /// List a directory's children.
    DirList { path: String },
    /// Delete an empty directory.
    DirDelete { path: String },
    /// Check whether a path resolves to a directory.
    DirExists { path: String },
    /// Fetch an entry's metadata.
    GetMetadata { path: String },
    /// Set an entry's permission bits.
    SetPermissions { path: String, mode: u32 },
    /// Fetch store and queue statistics.
    GetStats,
}

impl Operation {
    /// Returns the operation kind, without its arguments.
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::Login { .. } => OpKind::Login,
            Self::Logout => OpKind::Logout,
            Self::CreateUser { .. } => OpKind::CreateUser,
            Self::DeleteUser { .. } => OpKind::DeleteUser,
            Self::ListUsers => OpKind::ListUsers,
            Self::FileCreate { .. } => OpKind::FileCreate,
            Self::FileRead { .. } => OpKind::FileRead,
            Self::FileEdit { .. } => OpKind::FileEdit,
            Self::FileDelete { .. } => OpKind::FileDelete,
            Self::FileTruncate { .. } => OpKind::FileTruncate,
            Self::FileExists { .. } => OpKind::FileExists,
            Self::FileRename { .. } => OpKind::FileRename,
            Self::DirCreate { .. } => OpKind::DirCreate,
            Self::DirList { .. } => OpKind::DirList,
            Self::DirDelete { .. } => OpKind::DirDelete,
            Self::DirExists { .. } => OpKind::DirExists,
            Self::GetMetadata { .. } => OpKind::GetMetadata,
            Self::SetPermissions { .. } => OpKind::SetPermissions,
            Self::GetStats => OpKind::GetStats,
        }
    }

    /// True for operations that only admins may issue.
    #[must_use]
    pub const fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::CreateUser { .. } | Self::DeleteUser { .. } | Self::ListUsers
        )
    }

    /// True for operations that change container state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateUser { .. }
                | Self::DeleteUser { .. }
                | Self::FileCreate { .. }
                | Self::FileEdit { .. }
                | Self::FileDelete { .. }
                | Self::FileTruncate { .. }
                | Self::FileRename { .. }
                | Self::DirCreate { .. }
                | Self::DirDelete { .. }
                | Self::SetPermissions { .. }
        )
    }
}

/// Operation kinds, used for dispatch logging and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Login,
    Logout,
    CreateUser,
    DeleteUser,
    ListUsers,
    FileCreate,
    FileRead,
    FileEdit,
    FileDelete,
    FileTruncate,
    FileExists,
    FileRename,
    DirCreate,
    DirList,
    DirDelete,
    DirExists,
    GetMetadata,
    SetPermissions,
    GetStats,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::CreateUser => "CREATE_USER",
            Self::DeleteUser => "DELETE_USER",
            Self::ListUsers => "LIST_USERS",
            Self::FileCreate => "FILE_CREATE",
            Self::FileRead => "FILE_READ",
            Self::FileEdit => "FILE_EDIT",
            Self::FileDelete => "FILE_DELETE",
            Self::FileTruncate => "FILE_TRUNCATE",
            Self::FileExists => "FILE_EXISTS",
            Self::FileRename => "FILE_RENAME",
            Self::DirCreate => "DIR_CREATE",
            Self::DirList => "DIR_LIST",
            Self::DirDelete => "DIR_DELETE",
            Self::DirExists => "DIR_EXISTS",
            Self::GetMetadata => "GET_METADATA",
            Self::SetPermissions => "SET_PERMISSIONS",
            Self::GetStats => "GET_STATS",
        };
        write!(f, "{name}")
    }
}
