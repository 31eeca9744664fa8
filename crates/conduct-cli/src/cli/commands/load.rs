use conduct_core::resolver::ResolverChain;
use conduct_core::{bundle, BundleCache, BundleUpload, StatusPoller};
use tracing::{info, info_span};

use crate::cli::args::{GlobalArgs, LoadArgs};
use crate::exit_codes::SUCCESS;

pub async fn run(global: &GlobalArgs, args: LoadArgs) -> anyhow::Result<i32> {
    let settings = global.settings().await?;
    let cache = BundleCache::with_dir(global.cache_dir()?);
    let chain = ResolverChain::from_settings(&settings, info_span!("resolve"))?;

    info!(bundle = %args.bundle, "retrieving bundle");
    let artifact = chain.resolve_bundle(&cache, &args.bundle).await?;
    let bundle_conf = bundle::bundle_conf(&artifact.path).await?;

    let (configuration, bundle_conf_overlay) = match &args.configuration {
        Some(reference) => {
            info!(configuration = %reference, "retrieving configuration");
            let configuration = chain.resolve_bundle(&cache, reference).await?;
            let overlay = bundle::zip_entry(&configuration.path, bundle::BUNDLE_CONF).await?;
            (Some(configuration), overlay)
        }
        None => (None, None),
    };

    let client = global.control_client("load")?;
    info!("loading bundle to ConductR");
    let ack = client
        .load_bundle(BundleUpload {
            bundle: artifact,
            bundle_conf,
            configuration,
            bundle_conf_overlay,
        })
        .await?;

    if !global.no_wait {
        StatusPoller::new(client, info_span!("wait"))
            .await_installation(&ack.bundle_id, global.poll_options())
            .await?;
    }

    let id = global.display_id(&ack.bundle_id);
    let flags = global.hint_flags();
    if global.quiet {
        println!("{}", ack.bundle_id);
    } else {
        println!("Bundle loaded.");
        println!("Start bundle with: conduct run{} {}", flags, id);
        println!("Unload bundle with: conduct unload{} {}", flags, id);
    }

    Ok(SUCCESS)
}
