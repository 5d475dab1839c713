//! Idempotent seeding of static records
//!
//! Every seed carries a fixed UUID. A seed whose UUID already exists is
//! skipped, so running the seeder on every start creates each record once.

use crate::binding::EntityBinder;
use crate::config::SeedConfig;
use crate::core::catalog::EntityCatalog;
use crate::core::entity::Record;
use crate::core::error::{EntityError, RestResult};
use crate::core::store::{Persistence, find_by_uuid};

/// Create the seeds that do not exist yet, in one transaction
///
/// Seeds are applied in order, so a later seed may reference an earlier one
/// by UUID. Returns the number of records created.
pub async fn ensure_seeded(
    catalog: &EntityCatalog,
    persistence: &dyn Persistence,
    seeds: &[SeedConfig],
) -> RestResult<usize> {
    if seeds.is_empty() {
        return Ok(0);
    }

    let mut uow = persistence.begin().await?;
    let mut created = 0;

    for seed in seeds {
        let descriptor = catalog
            .get(&seed.entity)
            .or_else(|| catalog.resolve(&seed.entity))
            .filter(|d| !d.is_abstract)
            .ok_or_else(|| EntityError::UnknownType {
                name: seed.entity.clone(),
            })?;

        if find_by_uuid(uow.as_mut(), &descriptor.name, &seed.uuid)
            .await?
            .is_some()
        {
            tracing::debug!("Seed {} {} already present", descriptor.name, seed.uuid);
            continue;
        }

        let mut record = Record::new(&descriptor.name);
        EntityBinder::new(catalog, uow.as_mut())
            .bind(&mut record, &seed.values, descriptor)
            .await?;
        record.uuid = Some(seed.uuid.clone());
        uow.persist(record).await?;
        created += 1;
    }

    uow.flush().await?;
    uow.commit().await?;

    if created > 0 {
        tracing::info!("Seeded {} records", created);
    }
    Ok(created)
}
