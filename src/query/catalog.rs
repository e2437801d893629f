//! Attribute catalog
//!
//! Maps a field name to its value kind and a typed extraction function. The
//! table is built once per engine; filter compilation, find filters and
//! histogram contributions all resolve fields through it.
//!
//! | Kind | Fields |
//! |------|--------|
//! | long | id, accessTime, modTime, fileSize, diskspaceConsumed, memoryConsumed, fileReplica, numBlocks, numReplicas, depth, permission, dirNumChildren, dirSubTreeSize, dirSubTreeNumFiles, dirSubTreeNumDirs, storageType |
//! | string | user, group, name, path |
//! | boolean | isUnderConstruction, isWithSnapshot, hasAcl, hasQuota |
//! | date | modDate, accessDate |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::engine::traits::VersionCompat;
use crate::query::error::{join_valid, QueryError, QueryResult, ValueKind};
use crate::types::Record;

/// Extracts a long value
pub type LongFn = Arc<dyn Fn(&Record) -> i64 + Send + Sync>;

/// Borrows a string value
pub type StrFn = fn(&Record) -> &str;

/// Extracts a boolean value
pub type BoolFn = fn(&Record) -> bool;

/// Extracts a day; `None` means the record's timestamp has no valid day
pub type DateFn = fn(&Record) -> Option<NaiveDate>;

/// Typed extraction function
#[derive(Clone)]
pub enum Extractor {
    /// Long attribute
    Long(LongFn),
    /// String attribute
    Str(StrFn),
    /// Boolean attribute
    Bool(BoolFn),
    /// Date attribute
    Date(DateFn),
}

impl Extractor {
    /// Value kind produced by this extractor
    pub fn kind(&self) -> ValueKind {
        match self {
            Extractor::Long(_) => ValueKind::Long,
            Extractor::Str(_) => ValueKind::Str,
            Extractor::Bool(_) => ValueKind::Bool,
            Extractor::Date(_) => ValueKind::Date,
        }
    }
}

/// A named, typed attribute
#[derive(Clone)]
pub struct Attribute {
    /// Field name as used in filters
    pub name: &'static str,
    /// Extraction function
    pub extractor: Extractor,
}

impl Attribute {
    /// Value kind of the attribute
    pub fn kind(&self) -> ValueKind {
        self.extractor.kind()
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Registry of every filterable attribute
pub struct AttributeCatalog {
    attributes: HashMap<&'static str, Attribute>,
    order: Vec<&'static str>,
    compat: Arc<dyn VersionCompat>,
}

impl AttributeCatalog {
    /// Build the catalog, taking version-dependent fields from `compat`
    pub fn new(compat: Arc<dyn VersionCompat>) -> Self {
        let mut catalog = Self {
            attributes: HashMap::new(),
            order: Vec::new(),
            compat: compat.clone(),
        };

        catalog.long("id", |r| r.id);
        catalog.long("accessTime", |r| r.access_time);
        catalog.long("modTime", |r| r.mod_time);
        catalog.long("fileSize", Record::file_size);
        catalog.long("diskspaceConsumed", Record::diskspace_consumed);
        catalog.long("memoryConsumed", Record::memory_consumed);
        catalog.long("fileReplica", Record::replication);
        catalog.long("numBlocks", Record::num_blocks);
        catalog.long("numReplicas", Record::num_replicas);
        catalog.long("depth", Record::depth);
        catalog.long("permission", |r| r.permission as i64);

        let c = compat.clone();
        catalog.long("dirNumChildren", move |r| c.child_count(r));
        let c = compat.clone();
        catalog.long("dirSubTreeSize", move |r| c.subtree_size(r));
        let c = compat.clone();
        catalog.long("dirSubTreeNumFiles", move |r| c.subtree_files(r));
        let c = compat.clone();
        catalog.long("dirSubTreeNumDirs", move |r| c.subtree_dirs(r));
        let c = compat;
        catalog.long("storageType", move |r| c.storage_policy(r));

        catalog.insert("user", Extractor::Str(|r| r.user.as_str()));
        catalog.insert("group", Extractor::Str(|r| r.group.as_str()));
        catalog.insert("name", Extractor::Str(|r| r.name.as_str()));
        catalog.insert("path", Extractor::Str(|r| r.path.as_str()));

        catalog.insert(
            "isUnderConstruction",
            Extractor::Bool(|r| r.as_file().map(|f| f.under_construction).unwrap_or(false)),
        );
        catalog.insert(
            "isWithSnapshot",
            Extractor::Bool(|r| r.as_file().map(|f| f.has_snapshot).unwrap_or(false)),
        );
        catalog.insert("hasAcl", Extractor::Bool(|r| r.has_acl));
        catalog.insert(
            "hasQuota",
            Extractor::Bool(|r| r.as_dir().map(|d| d.has_quota).unwrap_or(false)),
        );

        catalog.insert("modDate", Extractor::Date(Record::mod_date));
        catalog.insert("accessDate", Extractor::Date(Record::access_date));

        catalog
    }

    fn long<F>(&mut self, name: &'static str, f: F)
    where
        F: Fn(&Record) -> i64 + Send + Sync + 'static,
    {
        self.insert(name, Extractor::Long(Arc::new(f)));
    }

    fn insert(&mut self, name: &'static str, extractor: Extractor) {
        debug_assert!(!self.attributes.contains_key(name), "duplicate attribute {name}");
        self.order.push(name);
        self.attributes.insert(name, Attribute { name, extractor });
    }

    /// Resolve a field name to its attribute
    pub fn resolve(&self, field: &str) -> QueryResult<&Attribute> {
        self.attributes
            .get(field)
            .ok_or_else(|| QueryError::UnresolvedFilter {
                field: field.to_string(),
                valid: join_valid(&self.order),
            })
    }

    /// Resolve a field that must be a long attribute
    ///
    /// `operator` names the operation asking, for the error message.
    pub fn resolve_long(&self, field: &str, operator: &str) -> QueryResult<LongFn> {
        let attribute = self.resolve(field)?;
        match &attribute.extractor {
            Extractor::Long(f) => Ok(f.clone()),
            other => Err(QueryError::UnsupportedOperator {
                field: field.to_string(),
                operator: operator.to_string(),
                kind: other.kind(),
                valid: "none (long attributes only)".to_string(),
            }),
        }
    }

    /// Every attribute as (name, kind), in catalog order
    ///
    /// This is the named-attribute table handed to an external query facility.
    pub fn columns(&self) -> Vec<(&'static str, ValueKind)> {
        self.order
            .iter()
            .filter_map(|name| self.attributes.get(name).map(|a| (a.name, a.kind())))
            .collect()
    }

    /// Names of all attributes of one kind
    pub fn names_of(&self, kind: ValueKind) -> Vec<&'static str> {
        self.columns()
            .into_iter()
            .filter(|(_, k)| *k == kind)
            .map(|(name, _)| name)
            .collect()
    }

    /// Version compatibility layer backing the version-dependent fields
    pub fn compat(&self) -> &Arc<dyn VersionCompat> {
        &self.compat
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if the catalog has no attributes
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for AttributeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeCatalog")
            .field("attributes", &self.order)
            .field("compat", &self.compat.compat_id())
            .finish()
    }
}
