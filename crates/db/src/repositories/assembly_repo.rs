//! Repository for assemblies and the manage capability.

use sortia_core::types::DbId;
use sqlx::PgPool;

use crate::models::assembly::Assembly;

const COLUMNS: &str = "id, title, source_settings, created_at";

pub struct AssemblyRepo;

impl AssemblyRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Assembly>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assemblies WHERE id = $1");
        sqlx::query_as::<_, Assembly>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The single capability check this subsystem enforces: whether the
    /// actor may manage selection runs on the assembly.
    pub async fn can_manage(
        pool: &PgPool,
        user_id: DbId,
        assembly_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                 SELECT 1 FROM assembly_managers \
                 WHERE assembly_id = $1 AND user_id = $2 \
             )",
        )
        .bind(assembly_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
