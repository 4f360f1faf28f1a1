use crate::config::advert_cache_dir;
use anyhow::{Context, Result};
use cid::Cid;
use dotstorage_index::advert::base58_multihash;
use dotstorage_index::{AdvertClient, AdvertEvent, JsonCache};

const SKIPPED_INDENT: &str = "              ";

async fn client(endpoint: &str) -> Result<AdvertClient> {
    let cache = JsonCache::open(advert_cache_dir()?).await?;
    Ok(AdvertClient::new(endpoint, cache)?)
}

/// Search the advertisement chain for the advert listing `content_cid`
pub async fn find_advert(content_cid: &str, endpoint: &str, verbose: bool) -> Result<()> {
    let cid = Cid::try_from(content_cid).with_context(|| format!("invalid CID: {}", content_cid))?;
    let client = client(endpoint).await?;

    let advert = client
        .find_advert(&cid, verbose, |event| match event {
            AdvertEvent::Advert { index, cid } => println!("Advert #{}: {}", index, cid),
            AdvertEvent::Entries { cid, total } => {
                println!("  └─ Entries: {} ({} total)", cid, total)
            }
            AdvertEvent::Skipped { multihash } => {
                println!("{}x {}", SKIPPED_INDENT, base58_multihash(multihash))
            }
        })
        .await?;

    println!(
        "{} ({}) found in advert {}",
        content_cid,
        base58_multihash(&cid.hash().to_bytes()),
        advert
    );
    Ok(())
}

/// List the adverts published after `since`, newest first
pub async fn adverts_since(since: &str, endpoint: &str) -> Result<()> {
    let client = client(endpoint).await?;
    client
        .adverts_since(since, |index, cid| println!("Advert #{}: {}", index, cid))
        .await?;
    Ok(())
}

/// Print every multihash in an advert's entries as a raw CID
pub async fn list_advert_entries(advert_cid: &str, endpoint: &str) -> Result<()> {
    let client = client(endpoint).await?;
    let advert = client.advert(advert_cid).await?;

    let entries_url = client.document_url(&advert.entries.cid)?;
    println!("Fetching entries from: {}", entries_url);

    for cid in client.fetch_entry_cids(&entries_url).await? {
        println!("{}", cid);
    }
    Ok(())
}
