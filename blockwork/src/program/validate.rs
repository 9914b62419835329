use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::block::{Block, BlockId, Form};
use crate::program::Program;

/// A position inside a `c` block: the owner and one of its slot keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub owner: BlockId,
    pub slot: String,
}

impl SlotRef {
    pub fn new(owner: impl Into<BlockId>, slot: impl Into<String>) -> Self {
        SlotRef {
            owner: owner.into(),
            slot: slot.into(),
        }
    }

    fn of(block: &Block) -> Option<Self> {
        match (&block.parent, &block.in_slot) {
            (Some(owner), Some(slot)) => Some(SlotRef::new(owner.clone(), slot.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.slot)
    }
}

fn describe(position: &Option<SlotRef>) -> String {
    match position {
        Some(slot) => slot.to_string(),
        None => "top level".to_string(),
    }
}

/// Declared shape of block kinds, used to check that `c` blocks expose
/// exactly the slots their kind declares.
pub trait KindCatalog {
    /// The form a kind declares, or `None` when the kind is unknown.
    fn declared_form(&self, kind: &str) -> Option<Form>;
    /// The slot keys a kind declares (empty for non-`c` kinds).
    fn declared_slots(&self, kind: &str) -> Vec<String>;
}

/// One broken program invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("node table key '{key}' holds block '{id}'")]
    KeyMismatch { key: BlockId, id: BlockId },

    #[error("{} refers to missing block '{to}'", .from.as_ref().map_or("heads".to_string(), |f| format!("block '{}'", f)))]
    DanglingReference { from: Option<BlockId>, to: BlockId },

    #[error("block '{id}' is reached more than once from the heads")]
    Revisited { id: BlockId },

    #[error("block '{id}' claims to be at {}, but sits at {}", describe(.found), describe(.expected))]
    ParentMismatch {
        id: BlockId,
        expected: Option<SlotRef>,
        found: Option<SlotRef>,
    },

    #[error("{form} block '{id}' cannot be placed {position}")]
    MisplacedForm {
        id: BlockId,
        form: Form,
        position: &'static str,
    },

    #[error("{form} block '{id}' has slots; only c blocks may")]
    SlotsOnNonC { id: BlockId, form: Form },

    #[error("{form} block '{id}' is not reachable from any head")]
    Orphan { id: BlockId, form: Form },

    #[error("value block '{id}' carries sequencing pointers")]
    LinkedValueBlock { id: BlockId },

    #[error("input '{key}' of block '{from}' refers to {form} block '{to}'; only reporters and predicates may be referenced")]
    InputTargetNotValue {
        from: BlockId,
        key: String,
        to: BlockId,
        form: Form,
    },

    #[error("block '{id}' has unknown kind '{kind}'")]
    UnknownKind { id: BlockId, kind: String },

    #[error("block '{id}' is a {found} but kind '{kind}' declares {declared}")]
    FormMismatch {
        id: BlockId,
        kind: String,
        declared: Form,
        found: Form,
    },

    #[error("block '{id}' exposes slots [{}] but kind '{kind}' declares [{}]", .found.join(", "), .expected.join(", "))]
    SlotMismatch {
        id: BlockId,
        kind: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl Violation {
    /// The block a host editor should highlight for this violation.
    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            Violation::KeyMismatch { key, .. } => Some(key),
            Violation::DanglingReference { from, .. } => from.as_ref(),
            Violation::Revisited { id }
            | Violation::ParentMismatch { id, .. }
            | Violation::MisplacedForm { id, .. }
            | Violation::SlotsOnNonC { id, .. }
            | Violation::Orphan { id, .. }
            | Violation::LinkedValueBlock { id }
            | Violation::UnknownKind { id, .. }
            | Violation::FormMismatch { id, .. }
            | Violation::SlotMismatch { id, .. } => Some(id),
            Violation::InputTargetNotValue { from, .. } => Some(from),
        }
    }
}

impl Program {
    /// Check the structural invariants. Returns every violation found.
    pub fn validate(&self) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        let mut walker = Walker {
            program: self,
            visited: BTreeSet::new(),
            violations: &mut violations,
        };
        for head in &self.heads {
            walker.walk_chain(head, None, None);
        }
        let visited = walker.visited;

        for (key, block) in &self.nodes {
            if *key != block.id {
                violations.push(Violation::KeyMismatch {
                    key: key.clone(),
                    id: block.id.clone(),
                });
            }
            if block.form != Form::C && !block.slot_heads.is_empty() {
                violations.push(Violation::SlotsOnNonC {
                    id: block.id.clone(),
                    form: block.form,
                });
            }
            if !visited.contains(&block.id) {
                if block.form.is_value() {
                    if block.next.is_some() || block.parent.is_some() || block.in_slot.is_some() {
                        violations.push(Violation::LinkedValueBlock {
                            id: block.id.clone(),
                        });
                    }
                } else {
                    violations.push(Violation::Orphan {
                        id: block.id.clone(),
                        form: block.form,
                    });
                }
            }
            for (input_key, input) in &block.inputs {
                let Some(target) = input.as_reference() else {
                    continue;
                };
                match self.nodes.get(target) {
                    None => violations.push(Violation::DanglingReference {
                        from: Some(block.id.clone()),
                        to: target.clone(),
                    }),
                    Some(t) if !t.form.is_value() => {
                        violations.push(Violation::InputTargetNotValue {
                            from: block.id.clone(),
                            key: input_key.clone(),
                            to: target.clone(),
                            form: t.form,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Check the structural invariants plus every block's shape against
    /// the kinds declared by `catalog`. Unknown kinds are violations.
    pub fn validate_with(&self, catalog: &dyn KindCatalog) -> Result<(), Vec<Violation>> {
        self.check_kinds(catalog, true)
    }

    /// Like [`Program::validate_with`], but blocks whose kind the catalog
    /// does not know are left alone.
    pub fn validate_shapes(&self, catalog: &dyn KindCatalog) -> Result<(), Vec<Violation>> {
        self.check_kinds(catalog, false)
    }

    fn check_kinds(&self, catalog: &dyn KindCatalog, strict: bool) -> Result<(), Vec<Violation>> {
        let mut violations = self.validate().err().unwrap_or_default();
        for block in self.nodes.values() {
            let Some(declared) = catalog.declared_form(&block.kind) else {
                if strict {
                    violations.push(Violation::UnknownKind {
                        id: block.id.clone(),
                        kind: block.kind.clone(),
                    });
                }
                continue;
            };
            if declared != block.form {
                violations.push(Violation::FormMismatch {
                    id: block.id.clone(),
                    kind: block.kind.clone(),
                    declared,
                    found: block.form,
                });
            }
            if block.form == Form::C {
                let mut expected = catalog.declared_slots(&block.kind);
                expected.sort();
                let found: Vec<String> = block.slot_heads.keys().cloned().collect();
                if expected != found {
                    violations.push(Violation::SlotMismatch {
                        id: block.id.clone(),
                        kind: block.kind.clone(),
                        expected,
                        found,
                    });
                }
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

struct Walker<'a> {
    program: &'a Program,
    visited: BTreeSet<BlockId>,
    violations: &'a mut Vec<Violation>,
}

impl Walker<'_> {
    /// Walk one chain. `owner` is the slot holding the chain (`None` for a
    /// top-level script); `from` names whoever points at `start`.
    fn walk_chain(&mut self, start: &BlockId, owner: Option<SlotRef>, from: Option<BlockId>) {
        let mut current = Some(start.clone());
        let mut from = from.or_else(|| owner.as_ref().map(|o| o.owner.clone()));
        let mut first = true;

        while let Some(id) = current {
            let Some(block) = self.program.nodes.get(&id) else {
                self.violations.push(Violation::DanglingReference { from, to: id });
                return;
            };
            if !self.visited.insert(id.clone()) {
                self.violations.push(Violation::Revisited { id });
                return;
            }

            if block.form.is_value() {
                self.violations.push(Violation::MisplacedForm {
                    id: id.clone(),
                    form: block.form,
                    position: "in a sequence",
                });
            } else if block.form == Form::Hat && !(first && owner.is_none()) {
                self.violations.push(Violation::MisplacedForm {
                    id: id.clone(),
                    form: block.form,
                    position: "anywhere but the start of a top-level script",
                });
            }

            let found = SlotRef::of(block);
            let partial = found.is_none() && (block.parent.is_some() || block.in_slot.is_some());
            if found != owner || partial {
                self.violations.push(Violation::ParentMismatch {
                    id: id.clone(),
                    expected: owner.clone(),
                    found,
                });
            }

            if block.form == Form::C {
                for (slot, head) in block.slot_children() {
                    self.walk_chain(head, Some(SlotRef::new(id.clone(), slot)), None);
                }
            }

            first = false;
            from = Some(id);
            current = block.next.clone();
        }
    }
}
