//! The ordered list of resolver endpoints to benchmark.
//!
//! The registry is read from a plain text source with one descriptor per
//! line. Surrounding whitespace is trimmed and blank lines are skipped.
//! There is no comment syntax. Loading fails on the first descriptor
//! that cannot be decoded rather than skipping it, and an input without
//! any usable descriptors is an error as well.

#![warn(clippy::missing_docs_in_private_items)]

use crate::descriptor::{Descriptor, DescriptorError};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::{error, fmt, slice};

//------------ ResolverEndpoint ----------------------------------------------

/// One resolver endpoint to be probed.
///
/// An endpoint is identified by its position in the registry, not by its
/// descriptor text. Descriptors are not guaranteed to be unique.
#[derive(Clone, Debug)]
pub struct ResolverEndpoint {
    /// The provider name, derived from the descriptor's host portion.
    provider: String,

    /// The descriptor exactly as it appeared in the input.
    stamp: String,

    /// The decoded descriptor.
    descriptor: Descriptor,
}

impl ResolverEndpoint {
    /// Returns the provider name.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Returns the original descriptor text.
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Returns the decoded descriptor.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

//------------ Registry ------------------------------------------------------

/// The ordered, immutable sequence of endpoints to benchmark.
#[derive(Clone, Debug)]
pub struct Registry {
    /// The endpoints in input order.
    endpoints: Vec<ResolverEndpoint>,
}

impl Registry {
    /// Loads the registry from the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(LoadError::Input)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Reads the registry from a line-oriented text source.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, LoadError> {
        let mut endpoints = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(LoadError::Input)?;
            let stamp = line.trim();
            if stamp.is_empty() {
                continue;
            }
            let descriptor =
                stamp.parse::<Descriptor>().map_err(|err| {
                    LoadError::BadDescriptor {
                        line_no: index + 1,
                        text: stamp.into(),
                        err,
                    }
                })?;
            endpoints.push(ResolverEndpoint {
                provider: descriptor.host().to_string(),
                stamp: stamp.into(),
                descriptor,
            });
        }
        if endpoints.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(Registry { endpoints })
    }

    /// Returns the number of endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns whether the registry is empty.
    ///
    /// Construction rejects empty input, so this is only useful for
    /// registries that were moved out of.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Returns the endpoint at the given index.
    pub fn get(&self, index: usize) -> Option<&ResolverEndpoint> {
        self.endpoints.get(index)
    }

    /// Returns an iterator over the endpoints in input order.
    pub fn iter(&self) -> slice::Iter<'_, ResolverEndpoint> {
        self.endpoints.iter()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a ResolverEndpoint;
    type IntoIter = slice::Iter<'a, ResolverEndpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//------------ LoadError -----------------------------------------------------

/// Loading the registry failed.
///
/// All variants are fatal: the run aborts before any probe is sent.
#[derive(Debug)]
pub enum LoadError {
    /// The input source could not be read.
    Input(io::Error),

    /// The input contained no usable descriptors.
    Empty,

    /// A line could not be decoded into a descriptor.
    BadDescriptor {
        /// The one-based line number of the offending line.
        line_no: usize,

        /// The offending line with surrounding whitespace removed.
        text: String,

        /// The underlying decode error.
        err: DescriptorError,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Input(err) => {
                write!(f, "cannot read resolver list: {}", err)
            }
            LoadError::Empty => write!(f, "resolver list is empty"),
            LoadError::BadDescriptor { line_no, text, err } => {
                write!(f, "failed to parse line {} '{}': {}", line_no, text, err)
            }
        }
    }
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LoadError::Input(err) => Some(err),
            LoadError::Empty => None,
            LoadError::BadDescriptor { err, .. } => Some(err),
        }
    }
}

//============ Tests =========================================================
