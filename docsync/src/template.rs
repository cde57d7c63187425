//! Path templates and placeholder resolution
//!
//! A template such as `users/{userId}/posts/{postId}` is expanded into a
//! concrete remote path. Each `{name}` token is looked up, in order, in:
//!
//! 1. variables supplied with the current call
//! 2. variables remembered from earlier opens
//! 3. the identity context, when `name` is the identity placeholder
//!    (resolving to the null token when nobody is signed in)
//!
//! Tokens that none of these sources can fill stay in the output verbatim.

use crate::error::TemplateError;
use crate::variables::PathVariables;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Placeholder name filled from the identity context
pub const IDENTITY_PLACEHOLDER: &str = "userId";

/// Token substituted for the identity placeholder when no identity is present
pub const NULL_IDENTITY: &str = "null";

/// One lexical piece of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Split a template into literal text and `{name}` tokens.
pub fn tokenize(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut open: Option<usize> = None;

    for (i, c) in template.char_indices() {
        match (c, open) {
            ('{', None) => {
                if literal_start < i {
                    segments.push(Segment::Literal(&template[literal_start..i]));
                }
                open = Some(i);
            }
            ('{', Some(_)) => {
                return Err(TemplateError::Nested {
                    template: template.to_string(),
                    position: i,
                });
            }
            ('}', None) => {
                return Err(TemplateError::Unmatched {
                    template: template.to_string(),
                    position: i,
                });
            }
            ('}', Some(start)) => {
                let name = &template[start + 1..i];
                if name.is_empty() {
                    return Err(TemplateError::Empty {
                        template: template.to_string(),
                        position: start,
                    });
                }
                segments.push(Segment::Placeholder(name));
                open = None;
                literal_start = i + 1;
            }
            _ => {}
        }
    }

    if let Some(start) = open {
        return Err(TemplateError::Unclosed {
            template: template.to_string(),
            position: start,
        });
    }
    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }

    Ok(segments)
}

/// Placeholder names in order of appearance.
pub fn placeholders(template: &str) -> Result<Vec<&str>, TemplateError> {
    Ok(tokenize(template)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect())
}

/// True when no placeholder syntax is left in `resolved`.
pub fn is_fully_resolved(resolved: &str) -> bool {
    !resolved.contains('{') && !resolved.contains('}')
}

/// Expands placeholders against the variable sources and identity context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderResolver {
    identity_placeholder: String,
    null_token: String,
}

impl Default for PlaceholderResolver {
    fn default() -> Self {
        Self {
            identity_placeholder: IDENTITY_PLACEHOLDER.to_string(),
            null_token: NULL_IDENTITY.to_string(),
        }
    }
}

impl PlaceholderResolver {
    pub fn new(identity_placeholder: impl Into<String>, null_token: impl Into<String>) -> Self {
        Self {
            identity_placeholder: identity_placeholder.into(),
            null_token: null_token.into(),
        }
    }

    pub fn identity_placeholder(&self) -> &str {
        &self.identity_placeholder
    }

    /// Resolve every token of `template` that any source can fill.
    pub fn resolve(
        &self,
        template: &str,
        supplied: &PathVariables,
        remembered: &PathVariables,
        identity: Option<&str>,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        for segment in tokenize(template)? {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = supplied.get(name).or_else(|| remembered.get(name)) {
                        out.push_str(value);
                    } else if name == self.identity_placeholder {
                        out.push_str(identity.unwrap_or(self.null_token.as_str()));
                    } else {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Resolve with the default identity placeholder and null token.
pub fn resolve(
    template: &str,
    supplied: &PathVariables,
    remembered: &PathVariables,
    identity: Option<&str>,
) -> Result<String, TemplateError> {
    PlaceholderResolver::default().resolve(template, supplied, remembered, identity)
}

/// A validated path template: well-formed braces, unique placeholder names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathTemplate(String);

impl PathTemplate {
    pub fn parse(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        let mut seen = HashSet::new();
        for name in placeholders(&template)? {
            if !seen.insert(name) {
                return Err(TemplateError::DuplicatePlaceholder {
                    template: template.clone(),
                    name: name.to_string(),
                });
            }
        }
        Ok(Self(template))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A template without placeholders names one fixed path.
    pub fn is_constant(&self) -> bool {
        is_fully_resolved(&self.0)
    }

    pub fn placeholders(&self) -> Vec<&str> {
        // parse() already validated the syntax
        placeholders(&self.0).unwrap_or_default()
    }

    pub fn resolve(
        &self,
        resolver: &PlaceholderResolver,
        supplied: &PathVariables,
        remembered: &PathVariables,
        identity: Option<&str>,
    ) -> Result<String, TemplateError> {
        resolver.resolve(&self.0, supplied, remembered, identity)
    }
}

impl TryFrom<String> for PathTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PathTemplate> for String {
    fn from(template: PathTemplate) -> Self {
        template.0
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
