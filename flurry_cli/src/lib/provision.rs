//! Create and drop objects with their access role hierarchies

use anyhow::Result;

use flurry_core::{
    config::{ParamValue, Params},
    naming::{ObjectType, Scope},
    provision::{deprovision, provision},
};

use crate::{print_or_apply, RunContext};

pub(super) async fn create(
    ctx: &RunContext,
    object_type: ObjectType,
    name: &str,
    params: Vec<(String, String)>,
    execute: bool,
) -> Result<()> {
    let hierarchies = ctx.hierarchies()?;
    let scope = Scope::parse(object_type, name)?;
    let overrides: Params = params
        .into_iter()
        .map(|(key, value)| (key, ParamValue::from_cli(&value)))
        .collect();

    let plan = provision(&hierarchies, &scope, overrides)?;
    print_or_apply(ctx, &format!("CREATE {scope}"), &plan.flatten(), execute).await
}

pub(super) async fn teardown(
    ctx: &RunContext,
    object_type: ObjectType,
    name: &str,
    execute: bool,
) -> Result<()> {
    let hierarchies = ctx.hierarchies()?;
    let scope = Scope::parse(object_type, name)?;
    let statements = deprovision(&hierarchies, &scope)?;
    print_or_apply(ctx, &format!("DROP {scope}"), &statements, execute).await
}
