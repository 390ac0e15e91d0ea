//! Shared types used across the codebase

/// Relations an article can eager-load alongside the primary row.
///
/// Parsed from the `include` query parameter: absent means everything,
/// an empty string means nothing, otherwise a comma separated list of
/// relation names (`photo`, `author`, `category`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Include {
    pub photo: bool,
    pub author: bool,
    pub category: bool,
}

impl Include {
    pub fn all() -> Self {
        Self {
            photo: true,
            author: true,
            category: true,
        }
    }

    pub fn none() -> Self {
        Self {
            photo: false,
            author: false,
            category: false,
        }
    }

    pub fn from_query(param: Option<&str>) -> Result<Self, String> {
        let Some(raw) = param else {
            return Ok(Self::all());
        };

        let mut include = Self::none();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name {
                "photo" => include.photo = true,
                "author" => include.author = true,
                "category" => include.category = true,
                other => return Err(format!("Unknown relation '{}' in include", other)),
            }
        }
        Ok(include)
    }
}

impl Default for Include {
    fn default() -> Self {
        Self::all()
    }
}
