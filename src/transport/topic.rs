//! Routing keys and topic binding patterns
//!
//! Routing keys are dot-separated words. Binding patterns use the topic
//! exchange wildcards: `*` matches exactly one word, `#` matches zero or
//! more words.

use std::fmt;

use crate::error::TransportError;

/// Well-known topic for body bags
pub const BODY_TOPIC: &str = "body";

/// Well-known topic for gesture bags
pub const GESTURE_TOPIC: &str = "gesture";

/// Routing key `{sender_id}.{topic}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    /// Operator-assigned or generated sender identifier
    pub sender_id: String,
    /// Payload kind, e.g. `body` or `gesture`
    pub topic: String,
}

impl RoutingKey {
    pub fn new(sender_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            topic: topic.into(),
        }
    }

    /// Split a concrete routing key at its first dot
    pub fn parse(key: &str) -> Result<Self, TransportError> {
        validate_routing_key(key)?;
        match key.split_once('.') {
            Some((sender_id, topic)) if !sender_id.is_empty() && !topic.is_empty() => {
                Ok(Self::new(sender_id, topic))
            }
            _ => Err(TransportError::InvalidRoutingKey(key.to_string())),
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sender_id, self.topic)
    }
}

/// Reject keys that cannot be routed: empty, or carrying wildcards
pub fn validate_routing_key(key: &str) -> Result<(), TransportError> {
    if key.is_empty() || key.contains(['*', '#']) {
        return Err(TransportError::InvalidRoutingKey(key.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Word(String),
    /// `*`
    One,
    /// `#`
    Any,
}

/// Compiled binding pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    /// Compile a binding key such as `*.body` or `lab.#`
    ///
    /// Wildcards must stand alone as a whole word.
    pub fn parse(pattern: &str) -> Result<Self, TransportError> {
        if pattern.is_empty() {
            return Err(TransportError::InvalidBindingKey(pattern.to_string()));
        }

        let segments = pattern
            .split('.')
            .map(|word| match word {
                "*" => Ok(Segment::One),
                "#" => Ok(Segment::Any),
                w if w.contains(['*', '#']) => {
                    Err(TransportError::InvalidBindingKey(pattern.to_string()))
                }
                w => Ok(Segment::Word(w.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Pattern as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether a concrete routing key is selected by this pattern
    pub fn matches(&self, routing_key: &str) -> bool {
        let words: Vec<&str> = routing_key.split('.').collect();
        match_segments(&self.segments, &words)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_segments(segments: &[Segment], words: &[&str]) -> bool {
    match segments.split_first() {
        None => words.is_empty(),
        Some((Segment::Any, rest)) => {
            // `#` absorbs 0..=n words
            (0..=words.len()).any(|skip| match_segments(rest, &words[skip..]))
        }
        Some((Segment::One, rest)) => !words.is_empty() && match_segments(rest, &words[1..]),
        Some((Segment::Word(w), rest)) => {
            words.first().is_some_and(|first| *first == w.as_str()) && match_segments(rest, &words[1..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_key_display() {
        let key = RoutingKey::new("lab", BODY_TOPIC);
        assert_eq!(key.to_string(), "lab.body");
    }

    #[test]
    fn test_routing_key_parse() {
        let key = RoutingKey::parse("lab.gesture").unwrap();
        assert_eq!(key.sender_id, "lab");
        assert_eq!(key.topic, "gesture");

        assert!(RoutingKey::parse("nodot").is_err());
        assert!(RoutingKey::parse(".body").is_err());
        assert!(RoutingKey::parse("*.body").is_err());
    }

    #[test]
    fn test_star_matches_one_word() {
        let pattern = TopicPattern::parse("*.body").unwrap();
        assert!(pattern.matches("lab.body"));
        assert!(!pattern.matches("lab.gesture"));
        assert!(!pattern.matches("body"));
        assert!(!pattern.matches("a.b.body"));
    }

    #[test]
    fn test_hash_matches_zero_or_more() {
        let pattern = TopicPattern::parse("lab.#").unwrap();
        assert!(pattern.matches("lab"));
        assert!(pattern.matches("lab.body"));
        assert!(pattern.matches("lab.body.extra"));
        assert!(!pattern.matches("other.body"));

        let all = TopicPattern::parse("#").unwrap();
        assert!(all.matches("anything.at.all"));
    }

    #[test]
    fn test_exact_pattern() {
        let pattern = TopicPattern::parse("sensor-1.gesture").unwrap();
        assert!(pattern.matches("sensor-1.gesture"));
        assert!(!pattern.matches("sensor-2.gesture"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(TopicPattern::parse("").is_err());
        assert!(TopicPattern::parse("lab*.body").is_err());
    }
}
