//! Diagnostic locations within a blueprint document.
//!
//! A [`Path`] names a piece of the blueprint (`deployment_groups[1].modules[0].settings.zone`)
//! so the front end can map an error back to a source position. Paths never
//! influence resolution.
//!
//! Each node shape of the document has its own builder type, so only valid
//! locations can be spelled:
//!
//! ```
//! use ghpc_common::path::Path;
//!
//! let p = Path::root().groups().at(3).modules().at(1).settings().dot("zone");
//! assert_eq!(p.to_string(), "deployment_groups[3].modules[1].settings.zone");
//! ```

use std::fmt;
use std::ops::Deref;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A fixed field of the blueprint schema.
    Field(&'static str),
    /// A user-chosen key inside a map (setting names, variable names).
    Key(String),
    /// A position inside a sequence.
    Index(usize),
}

/// Parent-linked location identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Returns the root of the blueprint document.
    #[must_use]
    pub const fn root() -> RootPath {
        RootPath(Self {
            segments: Vec::new(),
        })
    }

    /// Returns the root used for values synthesized by the resolver itself.
    #[must_use]
    pub fn internal() -> MapPath {
        MapPath(Self::root().0.field("__internal_path__"))
    }

    /// Returns the enclosing path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// Returns `true` for the document root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the segments from the root down.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Descends into a map entry.
    #[must_use]
    pub fn dot(&self, key: impl Into<String>) -> Self {
        self.child(Segment::Key(key.into()))
    }

    /// Descends into a sequence element.
    #[must_use]
    pub fn at(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    fn field(&self, name: &'static str) -> Self {
        self.child(Segment::Field(name))
    }

    fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

macro_rules! path_node {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(Path);

        impl Deref for $name {
            type Target = Path;

            fn deref(&self) -> &Path {
                &self.0
            }
        }

        impl From<$name> for Path {
            fn from(p: $name) -> Self {
                p.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

path_node!(
    /// Path to the blueprint root.
    RootPath
);
path_node!(
    /// Path to a string-keyed map (`vars`, `settings`, backend configuration).
    MapPath
);
path_node!(
    /// Path to a plain list of scalars (`use`).
    ListPath
);
path_node!(
    /// Path to the list of deployment groups.
    GroupsPath
);
path_node!(
    /// Path to one deployment group.
    GroupPath
);
path_node!(
    /// Path to the module list of a group.
    ModulesPath
);
path_node!(
    /// Path to one module.
    ModulePath
);
path_node!(
    /// Path to the declared outputs of a module.
    OutputsPath
);
path_node!(
    /// Path to one declared output.
    OutputPath
);
path_node!(
    /// Path to a backend block.
    BackendPath
);
path_node!(
    /// Path to the validator list.
    ValidatorsPath
);
path_node!(
    /// Path to one validator entry.
    ValidatorPath
);

impl RootPath {
    /// `blueprint_name`
    #[must_use]
    pub fn blueprint_name(&self) -> Path {
        self.0.field("blueprint_name")
    }

    /// `validation_level`
    #[must_use]
    pub fn validation_level(&self) -> Path {
        self.0.field("validation_level")
    }

    /// `vars`
    #[must_use]
    pub fn vars(&self) -> MapPath {
        MapPath(self.0.field("vars"))
    }

    /// `validators`
    #[must_use]
    pub fn validators(&self) -> ValidatorsPath {
        ValidatorsPath(self.0.field("validators"))
    }

    /// `deployment_groups`
    #[must_use]
    pub fn groups(&self) -> GroupsPath {
        GroupsPath(self.0.field("deployment_groups"))
    }

    /// `terraform_backend_defaults`
    #[must_use]
    pub fn backend_defaults(&self) -> BackendPath {
        BackendPath(self.0.field("terraform_backend_defaults"))
    }
}

impl MapPath {
    /// Entry `key` of the map.
    #[must_use]
    pub fn dot(&self, key: impl Into<String>) -> Path {
        self.0.dot(key)
    }
}

impl ListPath {
    /// Element `index` of the list.
    #[must_use]
    pub fn at(&self, index: usize) -> Path {
        self.0.at(index)
    }
}

impl GroupsPath {
    /// Group at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> GroupPath {
        GroupPath(self.0.at(index))
    }
}

impl GroupPath {
    /// `group` (the group name)
    #[must_use]
    pub fn name(&self) -> Path {
        self.0.field("group")
    }

    /// `terraform_backend`
    #[must_use]
    pub fn backend(&self) -> BackendPath {
        BackendPath(self.0.field("terraform_backend"))
    }

    /// `modules`
    #[must_use]
    pub fn modules(&self) -> ModulesPath {
        ModulesPath(self.0.field("modules"))
    }
}

impl ModulesPath {
    /// Module at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> ModulePath {
        ModulePath(self.0.at(index))
    }
}

impl ModulePath {
    /// `source`
    #[must_use]
    pub fn source(&self) -> Path {
        self.0.field("source")
    }

    /// `kind`
    #[must_use]
    pub fn kind(&self) -> Path {
        self.0.field("kind")
    }

    /// `id`
    #[must_use]
    pub fn id(&self) -> Path {
        self.0.field("id")
    }

    /// `use`
    #[must_use]
    pub fn uses(&self) -> ListPath {
        ListPath(self.0.field("use"))
    }

    /// `outputs`
    #[must_use]
    pub fn outputs(&self) -> OutputsPath {
        OutputsPath(self.0.field("outputs"))
    }

    /// `settings`
    #[must_use]
    pub fn settings(&self) -> MapPath {
        MapPath(self.0.field("settings"))
    }
}

impl OutputsPath {
    /// Output at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> OutputPath {
        OutputPath(self.0.at(index))
    }
}

impl OutputPath {
    /// `name`
    #[must_use]
    pub fn name(&self) -> Path {
        self.0.field("name")
    }

    /// `description`
    #[must_use]
    pub fn description(&self) -> Path {
        self.0.field("description")
    }

    /// `sensitive`
    #[must_use]
    pub fn sensitive(&self) -> Path {
        self.0.field("sensitive")
    }
}

impl BackendPath {
    /// `type`
    #[must_use]
    pub fn kind(&self) -> Path {
        self.0.field("type")
    }

    /// `configuration`
    #[must_use]
    pub fn configuration(&self) -> MapPath {
        MapPath(self.0.field("configuration"))
    }
}

impl ValidatorsPath {
    /// Validator at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> ValidatorPath {
        ValidatorPath(self.0.at(index))
    }
}

impl ValidatorPath {
    /// `validator`
    #[must_use]
    pub fn validator(&self) -> Path {
        self.0.field("validator")
    }

    /// `skip`
    #[must_use]
    pub fn skip(&self) -> Path {
        self.0.field("skip")
    }

    /// `inputs`
    #[must_use]
    pub fn inputs(&self) -> MapPath {
        MapPath(self.0.field("inputs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_renders_empty() {
        assert_eq!(Path::root().to_string(), "");
        assert!(Path::root().is_root());
    }

    #[test]
    fn top_level_fields_have_no_leading_dot() {
        let r = Path::root();
        assert_eq!(r.blueprint_name().to_string(), "blueprint_name");
        assert_eq!(r.vars().to_string(), "vars");
        assert_eq!(r.groups().to_string(), "deployment_groups");
        assert_eq!(r.backend_defaults().to_string(), "terraform_backend_defaults");
        assert_eq!(r.validation_level().to_string(), "validation_level");
    }

    #[test]
    fn module_paths_render() {
        let m = Path::root().groups().at(3).modules().at(1);
        assert_eq!(m.to_string(), "deployment_groups[3].modules[1]");
        assert_eq!(m.source().to_string(), "deployment_groups[3].modules[1].source");
        assert_eq!(m.uses().at(6).to_string(), "deployment_groups[3].modules[1].use[6]");
        assert_eq!(
            m.outputs().at(2).sensitive().to_string(),
            "deployment_groups[3].modules[1].outputs[2].sensitive"
        );
        assert_eq!(
            m.settings().dot("lime").to_string(),
            "deployment_groups[3].modules[1].settings.lime"
        );
    }

    #[test]
    fn group_and_backend_paths_render() {
        let g = Path::root().groups().at(0);
        assert_eq!(g.name().to_string(), "deployment_groups[0].group");
        assert_eq!(
            g.backend().configuration().dot("prefix").to_string(),
            "deployment_groups[0].terraform_backend.configuration.prefix"
        );
        assert_eq!(
            Path::root().backend_defaults().kind().to_string(),
            "terraform_backend_defaults.type"
        );
    }

    #[test]
    fn value_paths_descend_into_vars() {
        let p = Path::root().vars().dot("red").at(6).dot("silver");
        assert_eq!(p.to_string(), "vars.red[6].silver");
    }

    #[test]
    fn validator_paths_render() {
        let v = Path::root().validators().at(2);
        assert_eq!(v.validator().to_string(), "validators[2].validator");
        assert_eq!(v.inputs().dot("zebra").to_string(), "validators[2].inputs.zebra");
    }

    #[test]
    fn parent_walks_up_one_segment() {
        let r = Path::root();
        let red = r.vars().dot("red");
        assert_eq!(red.parent(), Some(Path::from(r.vars())));
        assert_eq!(Path::from(r.groups()).parent(), Some(Path::from(Path::root())));
        assert_eq!(Path::from(Path::root()).parent(), None);
    }

    #[test]
    fn internal_path_renders() {
        assert_eq!(Path::internal().dot("a").to_string(), "__internal_path__.a");
    }
}
