//! Free-text query classification.
//!
//! The coordinator depends only on [`QueryClassifier`]; [`RuleClassifier`] is
//! a keyword and capitalisation based implementation that needs no model.
//!
//! Each city is bound to the cue it belongs to: the nearest weather or
//! distance cue before it in the same sentence, else the next one after it.

use tracing::debug;

use crate::{
    config::DEFAULT_ORIGIN,
    gazetteer::Gazetteer,
    model::{CityReference, Intent},
};

/// Result of classifying one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    /// Every distinct city mentioned, in order of mention.
    pub cities: Vec<CityReference>,
    /// City the weather question is about.
    pub weather: Option<CityReference>,
    /// Origin and destination of the distance question.
    pub route: Option<(CityReference, CityReference)>,
    /// Mentioned cities that no request uses.
    pub ignored: Vec<CityReference>,
}

impl Classification {
    fn unknown(cities: Vec<CityReference>) -> Self {
        Self {
            intent: Intent::Unknown,
            cities,
            weather: None,
            route: None,
            ignored: Vec::new(),
        }
    }
}

pub trait QueryClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Classification;
}

const WEATHER_CUES: &[&str] = &[
    "weather", "temperature", "temp", "forecast", "rain", "raining", "rainy", "sunny", "snow",
    "snowing", "cloudy", "hot", "cold", "warm", "humid", "humidity", "wind", "windy", "climate",
    "conditions", "degrees",
];

const DISTANCE_CUES: &[&str] = &[
    "distance", "far", "km", "kilometers", "kilometres", "miles",
];

const STOPWORDS: &[&str] = &[
    "a", "about", "also", "an", "and", "any", "are", "at", "away", "be", "between", "but",
    "calculate", "can", "check", "city", "cities", "compare", "could", "current", "currently",
    "do", "does", "drive", "find", "fly", "for", "from", "get", "give", "go", "going", "hello",
    "hey", "hi", "how", "i", "in", "is", "it", "it's", "its", "know", "like", "long", "look",
    "many", "me", "much", "my", "need", "now", "of", "or", "outside", "please", "right", "see",
    "should", "show", "take", "tell", "thanks", "thank", "the", "then", "there", "to", "today",
    "today's", "travel", "trip", "want", "was", "what", "what's", "whats", "will", "would",
    "you",
];

/// Lower-case words allowed inside a multi-word capitalised name ("Rio de Janeiro").
const CONNECTORS: &[&str] = &["de", "del", "da", "do", "la", "le", "van", "von", "upon"];

/// Words after which a token is taken as a city ("weather in springfield").
const PLACE_PREPOSITIONS: &[&str] = &["in", "from", "to", "at", "for", "between"];

#[derive(Debug)]
struct Token {
    word: String,
    lower: String,
    capitalized: bool,
    /// Punctuation followed the word, so a name cannot continue past it.
    boundary: bool,
    /// The word closes a sentence ('.', '?' or '!').
    sentence_end: bool,
}

fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .filter_map(|raw| {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'');
            let word = word.trim_matches('\'');
            if word.is_empty() {
                return None;
            }
            let sentence_end = raw.ends_with(|c: char| matches!(c, '.' | '?' | '!'));
            let boundary = sentence_end || raw.ends_with(|c: char| matches!(c, ',' | ';' | ':'));
            Some(Token {
                word: word.to_string(),
                lower: word.to_lowercase(),
                capitalized: word.chars().next().is_some_and(char::is_uppercase),
                boundary,
                sentence_end,
            })
        })
        .collect()
}

fn is_cue(word: &str) -> bool {
    WEATHER_CUES.contains(&word) || DISTANCE_CUES.contains(&word)
}

fn is_noise(word: &str) -> bool {
    STOPWORDS.contains(&word) || is_cue(word)
}

fn title_case(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn same_city(a: &CityReference, b: &CityReference) -> bool {
    a.name.eq_ignore_ascii_case(&b.name)
}

fn push_distinct(list: &mut Vec<CityReference>, city: &CityReference) {
    if !list.iter().any(|c| same_city(c, city)) {
        list.push(city.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Weather,
    Distance,
}

#[derive(Debug)]
struct Cue {
    at: usize,
    sentence: usize,
    role: Role,
}

#[derive(Debug)]
struct Mention {
    city: CityReference,
    at: usize,
    sentence: usize,
}

/// Sentence number of every token.
fn sentences(tokens: &[Token]) -> Vec<usize> {
    let mut current = 0;
    tokens
        .iter()
        .map(|t| {
            let n = current;
            if t.sentence_end {
                current += 1;
            }
            n
        })
        .collect()
}

fn find_cues(tokens: &[Token], sentence_of: &[usize]) -> Vec<Cue> {
    tokens
        .iter()
        .enumerate()
        .filter_map(|(at, t)| {
            let role = if WEATHER_CUES.contains(&t.lower.as_str()) {
                Role::Weather
            } else if DISTANCE_CUES.contains(&t.lower.as_str()) {
                Role::Distance
            } else {
                return None;
            };
            Some(Cue {
                at,
                sentence: sentence_of[at],
                role,
            })
        })
        .collect()
}

/// Nearest cue before the mention in its sentence, else the next cue in its
/// sentence, else the nearest cue anywhere.
fn role_of(cues: &[Cue], mention: &Mention) -> Option<Role> {
    let before = cues.iter().rev().find(|c| c.at < mention.at);
    let after = cues.iter().find(|c| c.at > mention.at);
    let same = |c: &&Cue| c.sentence == mention.sentence;

    before
        .filter(same)
        .or_else(|| after.filter(same))
        .or(before)
        .or(after)
        .map(|c| c.role)
}

/// Keyword/capitalisation classifier.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    /// Known names split into words, longest first.
    known: Vec<Vec<String>>,
    default_origin: Option<String>,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new(&Gazetteer::builtin())
    }
}

impl RuleClassifier {
    pub fn new(gazetteer: &Gazetteer) -> Self {
        let mut known: Vec<Vec<String>> = gazetteer
            .names()
            .map(|n| n.split_whitespace().map(str::to_string).collect())
            .collect();
        known.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self {
            known,
            default_origin: Some(DEFAULT_ORIGIN.to_string()),
        }
    }

    /// Origin used when a distance question names a single city; `None` disables it.
    #[must_use]
    pub fn with_default_origin(mut self, origin: Option<String>) -> Self {
        self.default_origin = origin.filter(|o| !o.trim().is_empty());
        self
    }

    fn match_known(&self, tokens: &[Token], at: usize) -> Option<usize> {
        self.known.iter().find_map(|name| {
            let window = tokens.get(at..at + name.len())?;
            let inner_boundary = window[..window.len() - 1].iter().any(|t| t.boundary);
            let matches = window.iter().zip(name).all(|(t, w)| &t.lower == w);
            (matches && !inner_boundary).then_some(name.len())
        })
    }

    fn capitalized_run(tokens: &[Token], at: usize) -> Option<usize> {
        let first = &tokens[at];
        if !first.capitalized || is_noise(&first.lower) {
            return None;
        }
        // Sentence-initial capitals are ordinary words unless a preposition
        // introduces them; known names were matched before this point.
        let sentence_start = at == 0 || tokens[at - 1].sentence_end;
        if sentence_start && !Self::follows_preposition(tokens, at) {
            return None;
        }
        let mut end = at + 1;
        let mut last_boundary = first.boundary;
        while end < tokens.len() && !last_boundary {
            let next = &tokens[end];
            let continues = if next.capitalized {
                !is_noise(&next.lower)
            } else {
                CONNECTORS.contains(&next.lower.as_str())
                    && tokens
                        .get(end + 1)
                        .is_some_and(|t| t.capitalized && !is_noise(&t.lower))
            };
            if !continues {
                break;
            }
            last_boundary = next.boundary;
            end += 1;
        }
        Some(end - at)
    }

    fn follows_preposition(tokens: &[Token], at: usize) -> bool {
        at > 0
            && !tokens[at - 1].boundary
            && PLACE_PREPOSITIONS.contains(&tokens[at - 1].lower.as_str())
    }

    fn lowercase_after_preposition(tokens: &[Token], at: usize) -> bool {
        let token = &tokens[at];
        Self::follows_preposition(tokens, at)
            && !token.capitalized
            && token.lower.len() >= 3
            && token.lower.chars().all(char::is_alphabetic)
            && !is_noise(&token.lower)
    }

    /// Every city mention with its token position, repeats included.
    fn mentions(&self, tokens: &[Token], sentence_of: &[usize]) -> Vec<Mention> {
        let mut found = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let span = self
                .match_known(tokens, i)
                .or_else(|| Self::capitalized_run(tokens, i))
                .or_else(|| Self::lowercase_after_preposition(tokens, i).then_some(1));

            let Some(len) = span else {
                i += 1;
                continue;
            };

            let words: Vec<&str> = tokens[i..i + len].iter().map(|t| t.word.as_str()).collect();
            let name = if words.iter().all(|w| w.chars().next().is_some_and(char::is_lowercase)) {
                title_case(&words)
            } else {
                words.join(" ")
            };

            found.push(Mention {
                city: CityReference::named(name),
                at: i,
                sentence: sentence_of[i],
            });
            i += len;
        }

        found
    }

    /// City references in order of first mention, de-duplicated.
    pub fn extract_cities(&self, text: &str) -> Vec<CityReference> {
        let tokens = tokenize(text);
        let sentence_of = sentences(&tokens);
        let mut cities = Vec::new();
        for mention in self.mentions(&tokens, &sentence_of) {
            push_distinct(&mut cities, &mention.city);
        }
        cities
    }

    fn origin(&self) -> Option<CityReference> {
        self.default_origin.as_deref().map(CityReference::named)
    }

    /// Pair up the distance cities. A single city is measured from the
    /// weather city ("weather in Tokyo and how far to Paris"), else to the
    /// default origin.
    fn route(
        &self,
        distance: &[CityReference],
        weather: Option<&CityReference>,
        distance_cue: bool,
    ) -> Option<(CityReference, CityReference)> {
        match distance {
            [from, to, ..] => Some((from.clone(), to.clone())),
            [only] => weather
                .filter(|w| !same_city(w, only))
                .map(|w| (w.clone(), only.clone()))
                .or_else(|| {
                    self.origin()
                        .filter(|o| !same_city(o, only))
                        .map(|o| (only.clone(), o))
                }),
            [] if distance_cue => {
                let from = weather?;
                self.origin()
                    .filter(|o| !same_city(o, from))
                    .map(|o| (from.clone(), o))
            }
            [] => None,
        }
    }
}

impl QueryClassifier for RuleClassifier {
    fn classify(&self, text: &str) -> Classification {
        let tokens = tokenize(text);
        let sentence_of = sentences(&tokens);
        let cues = find_cues(&tokens, &sentence_of);
        let mentions = self.mentions(&tokens, &sentence_of);

        let mut cities = Vec::new();
        let mut weather_cities = Vec::new();
        let mut distance_cities = Vec::new();
        for mention in &mentions {
            push_distinct(&mut cities, &mention.city);
            match role_of(&cues, mention) {
                Some(Role::Weather) => push_distinct(&mut weather_cities, &mention.city),
                Some(Role::Distance) => push_distinct(&mut distance_cities, &mention.city),
                None => {}
            }
        }

        let distance_cue = cues.iter().any(|c| c.role == Role::Distance);
        let weather = weather_cities.first().cloned();
        let route = self.route(&distance_cities, weather.as_ref(), distance_cue);

        let intent = match (weather.is_some(), route.is_some()) {
            (true, true) => Intent::Both,
            (true, false) => Intent::Weather,
            (false, true) => Intent::Distance,
            (false, false) => return Classification::unknown(cities),
        };

        let used = |c: &CityReference| {
            weather.as_ref().is_some_and(|w| same_city(w, c))
                || route
                    .as_ref()
                    .is_some_and(|(from, to)| same_city(from, c) || same_city(to, c))
        };
        let mut ignored = Vec::new();
        for city in weather_cities.iter().skip(1).chain(distance_cities.iter().skip(2)) {
            if !used(city) {
                push_distinct(&mut ignored, city);
            }
        }

        debug!(
            %intent,
            weather = ?weather.as_ref().map(|c| c.name.as_str()),
            route = ?route.as_ref().map(|(a, b)| (a.name.as_str(), b.name.as_str())),
            ignored = ignored.len(),
            "query classified"
        );

        Classification {
            intent,
            cities,
            weather,
            route,
            ignored,
        }
    }
}
