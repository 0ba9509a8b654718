// Read-only queries over an index snapshot

pub mod engine;
pub mod suggest;

pub use engine::{
    EventListing, HitKind, LookupOutcome, MemberLookup, QueryEngine, SchemaOutcome, SchemaQuery, SearchHit,
    SearchResults, TypeFilter,
};
