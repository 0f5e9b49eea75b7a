use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ObjectError, ObjectResult};

/// Provenance metadata carried alongside a reference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferentOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ReferentOptions {
    pub fn is_empty(&self) -> bool {
        self.artifact.is_none()
            && self.id.is_none()
            && self.name.is_none()
            && self.path.is_none()
            && self.tag.is_none()
    }

    /// `artifact=..&id=..&name=..&path=..&tag=..` with only the set keys, in
    /// that order, values percent-encoded. `None` if nothing is set.
    pub fn to_query(&self) -> Option<String> {
        let params: Vec<String> = [
            ("artifact", &self.artifact),
            ("id", &self.id),
            ("name", &self.name),
            ("path", &self.path),
            ("tag", &self.tag),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|v| format!("{key}={}", urlencoding::encode(v)))
        })
        .collect();
        (!params.is_empty()).then(|| params.join("&"))
    }

    /// Parse a query produced by [`to_query`](Self::to_query). Unknown keys
    /// are ignored.
    pub fn from_query(query: &str) -> ObjectResult<Self> {
        let mut options = Self::default();
        for (key, value) in query_params(query)? {
            match key {
                "artifact" => options.artifact = Some(value),
                "id" => options.id = Some(value),
                "name" => options.name = Some(value),
                "path" => options.path = Some(value),
                "tag" => options.tag = Some(value),
                _ => {}
            }
        }
        Ok(options)
    }
}

/// Split `k=v&k=v` into decoded pairs.
pub(crate) fn query_params(query: &str) -> ObjectResult<Vec<(&str, String)>> {
    query
        .split('&')
        .map(|param| {
            let (key, value) = param
                .split_once('=')
                .ok_or_else(|| ObjectError::InvalidReference {
                    reference: query.to_string(),
                    reason: format!("parameter {param:?} is missing a value"),
                })?;
            let value = urlencoding::decode(value)?.into_owned();
            Ok((key, value))
        })
        .collect()
}

/// A value plus provenance options.
#[derive(Clone, Debug, PartialEq)]
pub struct Referent<T> {
    pub item: T,
    pub options: ReferentOptions,
}

impl<T> Referent<T> {
    pub fn with_item(item: T) -> Self {
        Self {
            item,
            options: ReferentOptions::default(),
        }
    }

    pub fn with_options(item: T, options: ReferentOptions) -> Self {
        Self { item, options }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Referent<U> {
        Referent {
            item: f(self.item),
            options: self.options,
        }
    }

    pub fn try_map<U>(self, f: impl FnOnce(T) -> ObjectResult<U>) -> ObjectResult<Referent<U>> {
        Ok(Referent {
            item: f(self.item)?,
            options: self.options,
        })
    }

    /// `<item>[?<query>]`, with the item rendered by `item`.
    pub fn to_data_string_with(
        &self,
        item: impl FnOnce(&T) -> ObjectResult<String>,
    ) -> ObjectResult<String> {
        let mut string = item(&self.item)?;
        if let Some(query) = self.options.to_query() {
            string.push('?');
            string.push_str(&query);
        }
        Ok(string)
    }

    /// Inverse of [`to_data_string_with`](Self::to_data_string_with).
    pub fn from_data_string_with(
        string: &str,
        item: impl FnOnce(&str) -> ObjectResult<T>,
    ) -> ObjectResult<Self> {
        let (item_string, query) = match string.split_once('?') {
            Some((item_string, query)) => (item_string, Some(query)),
            None => (string, None),
        };
        let options = match query {
            Some(query) if !query.is_empty() => ReferentOptions::from_query(query)?,
            _ => ReferentOptions::default(),
        };
        Ok(Self {
            item: item(item_string)?,
            options,
        })
    }
}

impl<T: fmt::Display> fmt::Display for Referent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.item)?;
        if let Some(query) = self.options.to_query() {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

impl<T> FromStr for Referent<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_data_string_with(s, |item| {
            item.parse().map_err(|e: T::Err| ObjectError::InvalidReference {
                reference: s.to_string(),
                reason: e.to_string(),
            })
        })
    }
}

/// Canonical data of a referent: either the string form or a map.
///
/// Both forms are accepted when decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferentData<T> {
    String(String),
    Map {
        item: T,
        #[serde(default, skip_serializing_if = "ReferentOptions::is_empty")]
        options: ReferentOptions,
    },
}
