use std::collections::BTreeMap;
use std::sync::Arc;

use schemaforge_core::{
    dereference, document_part, normalize_id, Naming, PrimitiveKind, Resolver, Schema, TypeId,
};

use crate::errors::{PlanError, Result};
use crate::options::PlanOptions;

/// Maps schema nodes to output type identities.
///
/// Explicit configuration wins over everything else. Built-in kinds map to
/// built-ins; objects, arrays, compositions and enumerations need a name
/// derived from the node identity. `Ok(None)` means no stable identity.
pub struct Typer {
    resolver: Arc<dyn Resolver>,
    naming: Naming,
    overrides: BTreeMap<String, TypeId>,
}

impl std::fmt::Debug for Typer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Typer")
            .field("naming", &self.naming)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

impl Typer {
    pub fn new(resolver: Arc<dyn Resolver>, options: &PlanOptions) -> Result<Self> {
        let overrides = options
            .type_overrides
            .iter()
            .map(|(schema, path)| {
                let ty = TypeId::parse(path).ok_or_else(|| {
                    PlanError::InvalidConfiguration(format!(
                        "type override for {schema} is not a built-in or module.Name: {path}"
                    ))
                })?;
                Ok((normalize_id(schema), ty))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            resolver,
            naming: options.naming.clone(),
            overrides,
        })
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    /// Follow `$ref` links to the node carrying content.
    pub fn dereference(&self, schema: &Arc<Schema>) -> Result<Arc<Schema>> {
        Ok(dereference(self.resolver.as_ref(), schema)?)
    }

    /// Type identity of `schema`. `hint` stands in for an undeclared kind.
    pub fn resolve(
        &self,
        schema: &Arc<Schema>,
        hint: Option<PrimitiveKind>,
    ) -> Result<Option<TypeId>> {
        if let Some(ty) = self.overrides.get(&normalize_id(&schema.id)) {
            return Ok(Some(ty.clone()));
        }

        let target = self.dereference(schema)?;
        if let Some(ty) = self.explicit(&target)? {
            return Ok(Some(if target.nullable {
                ty.into_optional()
            } else {
                ty
            }));
        }

        let kind = match target.kind {
            PrimitiveKind::Unknown => hint.unwrap_or_else(|| target.effective_kind()),
            declared => declared,
        };
        let composite = !target.all_of.is_empty()
            || !target.one_of.is_empty()
            || target.extension.discriminator.is_some();
        let enumerated = !target.enum_values.is_empty();

        if kind.is_scalar() && !composite {
            let named_enum = if enumerated {
                self.derive_name(&target)
            } else {
                None
            };
            if let Some((module, name)) = named_enum {
                return Ok(Some(TypeId::named(module, name)));
            }
            let ty = kind.builtin().map(TypeId::builtin);
            return Ok(ty.map(|ty| {
                if target.nullable {
                    ty.into_optional()
                } else {
                    ty
                }
            }));
        }

        let shaped = composite
            || enumerated
            || matches!(kind, PrimitiveKind::Object | PrimitiveKind::Array);
        if !shaped {
            return Ok(None);
        }

        Ok(self
            .derive_name(&target)
            .map(|(module, name)| TypeId::named(module, name)))
    }

    /// Whether `schema` carries explicit type configuration. Such types are
    /// declared outside the generated output and are never planned.
    pub fn is_explicit(&self, schema: &Arc<Schema>) -> Result<bool> {
        if self.overrides.contains_key(&normalize_id(&schema.id)) {
            return Ok(true);
        }
        let target = self.dereference(schema)?;
        Ok(self.explicit(&target)?.is_some())
    }

    fn explicit(&self, target: &Schema) -> Result<Option<TypeId>> {
        if let Some(ty) = self.overrides.get(&normalize_id(&target.id)) {
            return Ok(Some(ty.clone()));
        }
        match &target.extension.type_path {
            Some(path) => TypeId::parse(path).map(Some).ok_or_else(|| {
                PlanError::InvalidConfiguration(format!(
                    "type of {} is not a built-in or module.Name: {path}",
                    target.id
                ))
            }),
            None => Ok(None),
        }
    }

    /// Module and exported name derived from the node identity.
    ///
    /// The name starts from the `$id` anchor or the document stem and grows
    /// along the JSON pointer. Positional segments have no stable name.
    pub fn derive_name(&self, schema: &Schema) -> Option<(String, String)> {
        let document = document_part(&schema.id);
        let stem = document_stem(document)?;
        let module = self.naming.module(stem)?;

        let fragment = schema.id.split_once('#').map(|(_, fragment)| fragment);
        let (base, pointer) = match fragment {
            Some(pointer) if pointer.starts_with('/') => (stem, pointer),
            Some(anchored) if !anchored.is_empty() => match anchored.find('/') {
                Some(split) => anchored.split_at(split),
                None => (anchored, ""),
            },
            _ => (stem, ""),
        };

        let mut parts = vec![base.to_string()];
        let segments: Vec<String> = pointer
            .split('/')
            .skip(1)
            .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
            .collect();
        let mut segments = segments.iter().peekable();

        while let Some(segment) = segments.next() {
            match segment.as_str() {
                "definitions" | "$defs" => {
                    parts = vec![segments.next()?.clone()];
                }
                "properties" => parts.push(segments.next()?.clone()),
                "items" => {
                    if segments
                        .peek()
                        .is_some_and(|next| next.parse::<usize>().is_ok())
                    {
                        return None;
                    }
                    parts.push("Item".to_string());
                }
                "additionalProperties" => parts.push("Value".to_string()),
                // Anonymous branches are inlined into their parent, so only
                // nodes below a branch take the parent's name.
                "allOf" => {
                    segments.next()?.parse::<usize>().ok()?;
                    segments.peek()?;
                }
                _ => return None,
            }
        }

        let name = self.naming.exported(&parts.join("_"))?;
        Some((module, name))
    }
}

/// File name of a document without its extension.
fn document_stem(document: &str) -> Option<&str> {
    let path = document
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(document);
    let file = path.trim_end_matches('/').rsplit('/').next()?;
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    (!stem.is_empty()).then_some(stem)
}
