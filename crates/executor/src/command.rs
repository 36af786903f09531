//! Requests, methods and the commands they route to.
//!
//! A [`Request`] is what a transport hands over: a method plus the optional
//! path segments and token. Routing turns it into a [`Command`], or into the
//! 404/405 error for an unsupported endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read
    Get,
    /// Allocate
    Post,
    /// Never supported
    Put,
    /// Never supported
    Delete,
}

impl Method {
    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::InvalidMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// A transport-agnostic request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Series segment, e.g. `"1.4"`
    #[serde(default)]
    pub series: Option<String>,
    /// Commit segment
    #[serde(default)]
    pub commit: Option<String>,
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
}

impl Request {
    /// A request with no path segments and no token
    pub fn new(method: Method) -> Self {
        Self {
            method,
            series: None,
            commit: None,
            token: None,
        }
    }

    /// Set the series segment
    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    /// Set the commit segment
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// Set the token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("series", &self.series)
            .field("commit", &self.commit)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// An operation on the allocator, with its inputs still unvalidated.
///
/// Embedders with their own routing can build commands directly and pass
/// them to [`Executor::execute_command`](crate::Executor::execute_command).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Return the build number of `commit`, allocating one if needed
    Allocate {
        /// Series text
        series: String,
        /// Commit identifier
        commit: String,
    },
    /// Return the build number of `commit` without allocating
    Lookup {
        /// Series text
        series: String,
        /// Commit identifier
        commit: String,
    },
    /// List all builds of a series
    ListBuilds {
        /// Series text
        series: String,
    },
}

impl Command {
    /// Route a request to a command
    ///
    /// # Errors
    ///
    /// - `InvalidEndpoint` if the request names no series
    /// - `InvalidMethod` if the endpoint does not support the method
    pub fn route(request: &Request) -> Result<Command, Error> {
        let Some(series) = &request.series else {
            return Err(Error::InvalidEndpoint);
        };
        let series = series.clone();

        match (&request.commit, request.method) {
            (Some(commit), Method::Post) => Ok(Command::Allocate {
                series,
                commit: commit.clone(),
            }),
            (Some(commit), Method::Get) => Ok(Command::Lookup {
                series,
                commit: commit.clone(),
            }),
            (None, Method::Get) => Ok(Command::ListBuilds { series }),
            (_, method) => Err(Error::InvalidMethod {
                method: method.to_string(),
            }),
        }
    }

    /// Command name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Allocate { .. } => "allocate",
            Command::Lookup { .. } => "lookup",
            Command::ListBuilds { .. } => "list_builds",
        }
    }
}
