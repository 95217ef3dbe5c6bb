pub mod triangulation;

pub use triangulation::{
    circle_intersect, classify, consensus, multilaterate, project, CircleRelation, Fix,
    Intersection,
};
