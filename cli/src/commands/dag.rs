use anyhow::{anyhow, Context, Result};
use cid::Cid;
use dotstorage_dag::{BlockSource, CarBlockSource, DagWalker, SourceChain};
use futures::future::try_join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Pick the walk root: the explicit CID if given, otherwise the first root
/// of the first CAR header that lists one.
pub fn resolve_root<'a, I>(explicit: Option<&str>, car_roots: I) -> Result<Cid>
where
    I: IntoIterator<Item = &'a [Cid]>,
{
    if let Some(root) = explicit {
        return Cid::try_from(root).with_context(|| format!("invalid root CID: {}", root));
    }

    car_roots
        .into_iter()
        .find_map(|roots| roots.first().copied())
        .ok_or_else(|| anyhow!("root not found in CAR(s), use --root to specify"))
}

/// Walk the DAG under the root across the given CAR files, printing every
/// visited CID.
pub async fn is_dag_complete(car_paths: &[PathBuf], root: Option<&str>) -> Result<()> {
    let cars = try_join_all(car_paths.iter().map(|path| async move {
        CarBlockSource::open(path)
            .await
            .with_context(|| format!("failed to open CAR {}", path.display()))
    }))
    .await?;

    let root = resolve_root(root, cars.iter().map(|car| car.roots()))?;

    let mut sources = SourceChain::default();
    for car in cars {
        info!("Using {} ({} blocks)", car.name(), car.len());
        sources.push(Arc::new(car));
    }

    println!("Walking DAG from root: {}", root);
    let total = DagWalker::new(&sources)
        .walk_with(root, |cid| println!("{}", cid))
        .await?;
    println!("Total blocks: {}", total);
    println!("{} is a complete DAG in these CAR(s)", root);

    Ok(())
}
