//! Frame bags
//!
//! A bag bundles a sensor id with every item the sensor produced for one
//! frame. It is the unit of transmission: a bag is encoded and published
//! whole or not at all.

use crate::body::{BodyRecord, Gesture};

/// Items from one sensor for one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameBag<T> {
    /// Sensor the items came from
    pub sensor_id: String,
    /// Items in sensor order
    pub items: Vec<T>,
}

/// Bag of tracked bodies
pub type BodyBag = FrameBag<BodyRecord>;

/// Bag of gesture results
pub type GestureBag = FrameBag<Gesture>;

impl<T> FrameBag<T> {
    pub fn new(sensor_id: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            items,
        }
    }

    /// A bag with no items, used to signal "nothing tracked anymore"
    pub fn empty(sensor_id: impl Into<String>) -> Self {
        Self::new(sensor_id, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
