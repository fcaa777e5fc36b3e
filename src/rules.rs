//! Query rules, grouped by the dimension they produce.
//!
//! - `numeral`: plain decimal numbers, the building block for weights.
//! - `zone`: `zone 5` / `z5` forms.
//! - `weight`: `<numeral> lb|lbs|pound|pounds`, composed during saturation.

use crate::Rule;

pub mod numeral {
    pub mod helpers;
    pub mod predicates;
    pub mod rules;
}

pub mod zone {
    pub mod helpers;
    pub mod rules;
}

pub mod weight {
    pub mod rules;
}


/// Every rule the query parser runs, in a fixed order.
pub fn get() -> Vec<Rule> {
    let mut rules = numeral::rules::get();
    rules.extend(zone::rules::get());
    rules.extend(weight::rules::get());
    rules
}
