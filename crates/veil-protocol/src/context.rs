//! Engine context lifecycle on the handoff medium.
//!
//! The delegating party generates a context (or reloads one shared with
//! another data owner) and persists three entries:
//!
//! - `context`: scheme parameters
//! - `public_material`: what the computing party needs to evaluate
//! - `secret_key`: only written when the backend has secret material
//!
//! The computing party loads `context` + `public_material` only.

use crate::config::Locations;
use crate::error::{ProtocolError, ProtocolResult};
use crate::handoff::HandoffMedium;
use crate::protocol::Stage;
use tracing::{debug, info};
use veil_engine::{ConfidentialityEngine, ContextBundle};

/// Fresh context via keygen, or the persisted one (with secret) when `load` is set
pub fn obtain_context<E, M>(
    engine: &E,
    medium: &M,
    locations: &Locations,
    load: bool,
) -> ProtocolResult<E::Context>
where
    E: ConfidentialityEngine,
    M: HandoffMedium,
{
    if load {
        info!(location = %locations.context_location(), "Loading existing context");
        return load_context(
            engine,
            medium,
            Stage::Prepare,
            &locations.context_location(),
            &locations.public_material_location(),
            Some(&locations.secret_key_location()),
        );
    }
    engine.keygen().map_err(ProtocolError::engine(Stage::Prepare))
}

/// Write a context's parts to the medium
pub fn persist_context<E, M>(
    engine: &E,
    medium: &M,
    locations: &Locations,
    ctx: &E::Context,
) -> ProtocolResult<()>
where
    E: ConfidentialityEngine,
    M: HandoffMedium,
{
    let stage = Stage::Transfer;
    let bundle = engine
        .export_context(ctx)
        .map_err(ProtocolError::engine(stage))?;

    write(medium, stage, &locations.context_location(), &bundle.params)?;
    write(
        medium,
        stage,
        &locations.public_material_location(),
        &bundle.public_material,
    )?;
    if let Some(secret) = &bundle.secret {
        write(medium, stage, &locations.secret_key_location(), secret)?;
    }

    debug!(
        context = %locations.context_location(),
        has_secret = bundle.has_secret(),
        "Persisted context"
    );
    Ok(())
}

/// Read a context back.
///
/// `secret_location` is optional, and so is the entry it names: backends
/// without secret material never write one.
pub fn load_context<E, M>(
    engine: &E,
    medium: &M,
    stage: Stage,
    context_location: &str,
    public_material_location: &str,
    secret_location: Option<&str>,
) -> ProtocolResult<E::Context>
where
    E: ConfidentialityEngine,
    M: HandoffMedium,
{
    let params = read(medium, stage, context_location)?;
    let public_material = read(medium, stage, public_material_location)?;
    let secret = match secret_location {
        Some(location) if medium.exists(location) => Some(read(medium, stage, location)?),
        _ => None,
    };

    let bundle = ContextBundle {
        params,
        public_material,
        secret,
    };
    engine
        .import_context(&bundle)
        .map_err(ProtocolError::engine(stage))
}

pub(crate) fn read<M: HandoffMedium>(medium: &M, stage: Stage, location: &str) -> ProtocolResult<Vec<u8>> {
    medium
        .read(location)
        .map_err(|e| ProtocolError::io(stage, location, e))
}

pub(crate) fn write<M: HandoffMedium>(
    medium: &M,
    stage: Stage,
    location: &str,
    bytes: &[u8],
) -> ProtocolResult<()> {
    medium
        .write(location, bytes)
        .map_err(|e| ProtocolError::io(stage, location, e))
}
