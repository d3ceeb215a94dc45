mod beta;
mod binomial;
mod haversine;

pub use {
    binomial::clopper_pearson,
    haversine::{haversine, haversine_nmi},
};
