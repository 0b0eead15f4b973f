use crate::config::CatalogConfig;
use crate::models::ContentRef;

/// Resolves neighbouring items within the same content series.
/// Navigation never crosses from episodes into movies or specials.
pub trait ContentNavigator: Send + Sync {
    fn next(&self, current: &ContentRef) -> Option<ContentRef>;

    fn previous(&self, current: &ContentRef) -> Option<ContentRef>;
}

/// Episodes numbered `1..=total_episodes`, plus ordered movie and special
/// id lists
#[derive(Debug, Clone)]
pub struct SeriesCatalog {
    total_episodes: u32,
    movie_ids: Vec<u32>,
    special_ids: Vec<u32>,
}

impl SeriesCatalog {
    pub fn new(total_episodes: u32, movie_ids: Vec<u32>, special_ids: Vec<u32>) -> Self {
        Self {
            total_episodes,
            movie_ids,
            special_ids,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(
            config.total_episodes,
            config.movie_ids.clone(),
            config.special_ids.clone(),
        )
    }

    pub fn contains(&self, content: &ContentRef) -> bool {
        match content {
            ContentRef::Episode(n) => (1..=self.total_episodes).contains(n),
            ContentRef::Movie(id) => self.movie_ids.contains(id),
            ContentRef::Special(id) => self.special_ids.contains(id),
        }
    }

    fn ids_for(&self, content: &ContentRef) -> Option<&[u32]> {
        match content {
            ContentRef::Episode(_) => None,
            ContentRef::Movie(_) => Some(&self.movie_ids),
            ContentRef::Special(_) => Some(&self.special_ids),
        }
    }

    fn step(&self, current: &ContentRef, forward: bool) -> Option<ContentRef> {
        match self.ids_for(current) {
            None => {
                let n = current.number();
                let target = if forward { n.checked_add(1)? } else { n.checked_sub(1)? };
                (1..=self.total_episodes)
                    .contains(&target)
                    .then(|| current.with_number(target))
            }
            Some(ids) => {
                let index = ids.iter().position(|id| *id == current.number())?;
                let target = if forward { index + 1 } else { index.checked_sub(1)? };
                ids.get(target).map(|id| current.with_number(*id))
            }
        }
    }
}

impl ContentNavigator for SeriesCatalog {
    fn next(&self, current: &ContentRef) -> Option<ContentRef> {
        self.step(current, true)
    }

    fn previous(&self, current: &ContentRef) -> Option<ContentRef> {
        self.step(current, false)
    }
}
