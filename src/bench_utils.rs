//! Deterministic synthetic movie datasets for benchmarks and tests.

use chrono::NaiveDate;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::movies::{ActedIn, Directed, Movie, MovieContainer, Person, Produced, Wrote};

const GENRES: &[&str] = &[
    "Action", "Comedy", "Drama", "Horror", "Romance", "Science Fiction", "Thriller",
];

#[derive(Clone, Copy, Debug)]
pub struct MovieShape {
    pub persons: usize,
    pub movies: usize,
    /// Cast members per movie; each movie also gets one director, writer and producer.
    pub cast_per_movie: usize,
    /// Share of relations pointing at a person that does not exist, 0.0 to 1.0.
    pub dangling_ratio: f64,
}

impl MovieShape {
    pub fn new(persons: usize, movies: usize) -> Self {
        Self {
            persons,
            movies,
            cast_per_movie: 4,
            dangling_ratio: 0.0,
        }
    }

    pub fn with_cast(mut self, cast_per_movie: usize) -> Self {
        self.cast_per_movie = cast_per_movie;
        self
    }

    pub fn with_dangling_ratio(mut self, ratio: f64) -> Self {
        self.dangling_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Relations generated per movie.
    pub fn relations_per_movie(&self) -> usize {
        if self.persons == 0 {
            0
        } else {
            self.cast_per_movie + 3
        }
    }
}

/// Person keys are `1..=persons`, movie keys `100_001..`. Dangling relations use
/// person keys above `persons`.
pub fn generate_movies(shape: MovieShape, seed: u64) -> MovieContainer {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut container = MovieContainer::new();
    let base_date = NaiveDate::from_ymd_opt(1950, 1, 1).unwrap_or(NaiveDate::MIN);

    for idx in 0..shape.persons {
        let tmdb_id = idx as i64 + 1;
        let mut person = Person::new(tmdb_id, format!("Person {tmdb_id}"));
        person.imdb_id = Some(format!("nm{tmdb_id:07}"));
        let gender = if rng.gen_bool(0.5) { "F" } else { "M" };
        person.gender = Some(gender.to_string());
        person.birth_date = base_date.checked_add_days(chrono::Days::new(rng.gen_range(0..18_000)));
        person.popularity = rng.gen_range(0.0..100.0);
        container.persons.push(person);
    }

    for idx in 0..shape.movies {
        let tmdb_id = 100_001 + idx as i64;
        let mut movie = Movie::new(tmdb_id, format!("Movie {tmdb_id}"));
        movie.imdb_id = Some(format!("tt{tmdb_id:07}"));
        movie.genres = (0..rng.gen_range(1..=3))
            .map(|_| GENRES[rng.gen_range(0..GENRES.len())].to_string())
            .collect();
        movie.release_date =
            base_date.checked_add_days(chrono::Days::new(rng.gen_range(0..26_000)));
        movie.rating = (rng.gen_range(10..100) as f64) / 10.0;
        movie.budget = rng.gen_range(0..200) * 1_000_000;
        container.movies.push(movie);

        if shape.persons == 0 {
            continue;
        }
        for order in 0..shape.cast_per_movie {
            let person = pick_person(&mut rng, &shape);
            container.actor_relations.push(ActedIn::new(
                person,
                tmdb_id,
                order as i32,
                format!("Role {order}"),
            ));
        }
        container
            .director_relations
            .push(Directed::new(pick_person(&mut rng, &shape), tmdb_id));
        container
            .writer_relations
            .push(Wrote::new(pick_person(&mut rng, &shape), tmdb_id));
        container
            .producer_relations
            .push(Produced::new(pick_person(&mut rng, &shape), tmdb_id));
    }
    container
}

fn pick_person(rng: &mut StdRng, shape: &MovieShape) -> i64 {
    if shape.dangling_ratio > 0.0 && rng.gen_bool(shape.dangling_ratio) {
        (shape.persons + 1 + rng.gen_range(0..1_000)) as i64
    } else {
        rng.gen_range(1..=shape.persons) as i64
    }
}
