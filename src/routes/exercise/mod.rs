mod handler;
pub mod model;

pub use handler::{check_answer, generate_choukai};
pub use model::{ChoukaiExercise, DialogLine, Question};
