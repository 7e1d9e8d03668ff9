//! Movie graph domain: people, movies and the four credit relations between them.

use chrono::NaiveDate;

use crate::{
    entity::{NodeCollection, RelationCollection, Snapshot},
    mapping::MappingConfig,
};

pub const PERSON_LABEL: &str = "Person";
pub const MOVIE_LABEL: &str = "Movie";

crate::graph_node! {
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct Person: "Person", key = tmdb_id {
        pub tmdb_id: i64,
        pub imdb_id: Option<String>,
        pub name: String,
        pub gender: Option<String>,
        pub birth_date: Option<NaiveDate>,
        pub death_date: Option<NaiveDate>,
        pub birth_place: Option<String>,
        pub biography: Option<String>,
        pub popularity: f64,
    }
}

crate::graph_node! {
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct Movie: "Movie", key = tmdb_id {
        pub tmdb_id: i64,
        pub imdb_id: Option<String>,
        pub title: String,
        pub original_title: Option<String>,
        pub collection_info: Option<String>,
        pub genres: Vec<String>,
        pub release_date: Option<NaiveDate>,
        pub plot: Option<String>,
        pub tagline: Option<String>,
        pub original_language: Option<String>,
        pub rating: f64,
        pub budget: i64,
    }
}

crate::graph_relation! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct ActedIn: "ActedIn", from = i64, to = i64 {
        pub order: i32,
        pub role: Option<String>,
    }
}

crate::graph_relation! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct Directed: "Directed", from = i64, to = i64 {}
}

crate::graph_relation! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct Wrote: "Wrote", from = i64, to = i64 {}
}

crate::graph_relation! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct Produced: "Produced", from = i64, to = i64 {}
}

impl Person {
    pub fn new(tmdb_id: i64, name: impl Into<String>) -> Self {
        Self {
            tmdb_id,
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Movie {
    pub fn new(tmdb_id: i64, title: impl Into<String>) -> Self {
        Self {
            tmdb_id,
            title: title.into(),
            ..Self::default()
        }
    }
}

impl ActedIn {
    pub fn new(person: i64, movie: i64, order: i32, role: impl Into<String>) -> Self {
        Self {
            from_key: person,
            to_key: movie,
            order,
            role: Some(role.into()),
        }
    }
}

impl Directed {
    pub fn new(person: i64, movie: i64) -> Self {
        Self {
            from_key: person,
            to_key: movie,
        }
    }
}

impl Wrote {
    pub fn new(person: i64, movie: i64) -> Self {
        Self {
            from_key: person,
            to_key: movie,
        }
    }
}

impl Produced {
    pub fn new(person: i64, movie: i64) -> Self {
        Self {
            from_key: person,
            to_key: movie,
        }
    }
}

/// Person.tmdbId to Movie.tmdbId resolution under `relation_name`.
pub fn credit_mapping(relation_name: &str) -> MappingConfig {
    MappingConfig::new(relation_name, PERSON_LABEL, "TmdbId", MOVIE_LABEL, "TmdbId")
}

pub fn acted_in_mapping() -> MappingConfig {
    credit_mapping("ACTED_IN")
}

pub fn directed_mapping() -> MappingConfig {
    credit_mapping("DIRECTED")
}

pub fn wrote_mapping() -> MappingConfig {
    credit_mapping("WROTE")
}

pub fn produced_mapping() -> MappingConfig {
    credit_mapping("PRODUCED")
}

/// A deserialized movie dataset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovieContainer {
    pub persons: Vec<Person>,
    pub movies: Vec<Movie>,
    pub actor_relations: Vec<ActedIn>,
    pub director_relations: Vec<Directed>,
    pub writer_relations: Vec<Wrote>,
    pub producer_relations: Vec<Produced>,
}

impl MovieContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relation_count(&self) -> usize {
        self.actor_relations.len()
            + self.director_relations.len()
            + self.writer_relations.len()
            + self.producer_relations.len()
    }

    pub fn item_count(&self) -> usize {
        self.persons.len() + self.movies.len() + self.relation_count()
    }

    /// Persons, movies, then the four credit kinds.
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot::new()
            .with_nodes(NodeCollection::from_entities(self.persons))
            .with_nodes(NodeCollection::from_entities(self.movies))
            .with_relations(RelationCollection::from_relations(
                acted_in_mapping(),
                self.actor_relations,
            ))
            .with_relations(RelationCollection::from_relations(
                directed_mapping(),
                self.director_relations,
            ))
            .with_relations(RelationCollection::from_relations(
                wrote_mapping(),
                self.writer_relations,
            ))
            .with_relations(RelationCollection::from_relations(
                produced_mapping(),
                self.producer_relations,
            ))
    }
}
