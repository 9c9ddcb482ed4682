//! `populace-core`: a declarative, dependency-ordered database seeding
//! engine. Blueprints describe items (tables), their fields (generators,
//! expressions, cross-references), and count policies; `Blueprint::generate`
//! walks them in dependency order and drives rows through a backend.
//!
//! # Example
//!
//! ```ignore
//! use populace_core::{Blueprint, Item, Count, Field, FieldKind};
//! use populace_core::generator::string::FirstNameGen;
//! use populace_core::expr::Expr;
//!
//! let mut blueprint = Blueprint::new(42);
//! let mut users = Item::new("users", "users", Count::Fixed(Expr::Literal(100.into())));
//! users.add_field("name", Field::new(FieldKind::Generator(std::rc::Rc::new(FirstNameGen::default()))));
//! blueprint.add_item(users)?;
//! blueprint.generate(&mut backend).await?;
//! # Ok::<(), populace_core::error::Error>(())
//! ```

pub mod backend;
pub mod blueprint;
pub mod bloom;
pub mod buffer;
pub mod count;
pub mod datasets;
pub mod error;
pub mod expr;
pub mod factory;
pub mod generator;
pub mod item;
pub mod rng;
pub mod value;

pub use backend::Backend;
pub use blueprint::Blueprint;
pub use count::Count;
pub use error::{Error, Result};
pub use expr::{EvalEnv, Expr};
pub use item::{Field, FieldKind, Item};
pub use value::Value;
