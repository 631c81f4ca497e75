use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form attributes attached to a search or a listing.
pub type Metadata = Map<String, Value>;

/// Payload for creating a search. Server-generated fields are not accepted here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewSearch {
    pub prompt: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl NewSearch {
    pub fn new(prompt: impl Into<String>, metadata: Option<Metadata>) -> NewSearch {
        NewSearch {
            prompt: prompt.into(),
            metadata,
        }
    }
}

/// A stored row of the `Busquedas` table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Search {
    pub id: Uuid,
    pub prompt: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewListing {
    pub search_id: Uuid,
    pub link: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl NewListing {
    pub fn new(search_id: Uuid, link: impl Into<String>, metadata: Option<Metadata>) -> NewListing {
        NewListing {
            search_id,
            link: link.into(),
            metadata,
        }
    }
}

/// A stored row of the `Listings` table. `search_id` always points at a `Search`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: Uuid,
    pub search_id: Uuid,
    pub link: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
}

/// A search together with every listing that references it.
/// Listing order is whatever the datastore returned.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchWithListings {
    pub search: Search,
    #[serde(default)]
    pub listings: Vec<Listing>,
}
