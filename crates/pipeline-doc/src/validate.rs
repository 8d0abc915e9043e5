use crate::{BindingClass, BindingSlot, BindingTable, Dimension, PipelineDescriptor};
use std::fmt;

/// Why a pass binding cannot be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceProblem {
    /// No texture of any dimensionality has the name
    Missing,
    /// The texture exists but a role requires another dimensionality
    WrongDimension { expected: Dimension, actual: Dimension },
}

/// An unresolvable pass-to-texture reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceIssue {
    pub pass: String,
    pub slot: BindingSlot,
    pub problem: ReferenceProblem,
}

impl ReferenceIssue {
    pub fn class(&self) -> BindingClass {
        self.slot.class
    }
}

impl fmt::Display for ReferenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problem {
            ReferenceProblem::Missing => write!(
                f,
                "pass \"{}\": {} unit {} ({}) references missing texture \"{}\"",
                self.pass, self.slot.class, self.slot.unit, self.slot.uniform, self.slot.texture
            ),
            ReferenceProblem::WrongDimension { expected, actual } => write!(
                f,
                "pass \"{}\": {} unit {} ({}) needs a {expected} texture but \"{}\" is {actual}",
                self.pass, self.slot.class, self.slot.unit, self.slot.uniform, self.slot.texture
            ),
        }
    }
}

impl PipelineDescriptor {
    /// Checks every pass binding against the declared textures
    ///
    /// # Returns
    /// One issue per unresolvable slot, in pass order and then slot order
    /// (images before samplers); empty when all references resolve
    pub fn reference_issues(&self) -> Vec<ReferenceIssue> {
        let mut issues = Vec::new();
        for pass in &self.passes {
            let table = BindingTable::for_pass(pass);
            for slot in table.slots() {
                let problem = match (self.texture(&slot.texture), slot.required_dimension()) {
                    (None, _) => ReferenceProblem::Missing,
                    (Some(texture), Some(expected)) if texture.dimension() != expected => ReferenceProblem::WrongDimension {
                        expected,
                        actual: texture.dimension(),
                    },
                    _ => continue,
                };
                issues.push(ReferenceIssue {
                    pass: pass.name.clone(),
                    slot: slot.clone(),
                    problem,
                });
            }
        }
        issues
    }
}
