use crate::{
    api::{CloudProvider, KubeOneCluster},
    version::KubernetesVersion,
};

/// In-tree cloud providers were removed from Kubernetes in this release.
const EXTERNAL_CLOUD_PROVIDER_SINCE: (u64, u64) = (1, 27);

pub(super) fn default_cloud_provider(cluster: &mut KubeOneCluster) {
    default_external(cluster);
    default_cloud_config(cluster);
}

fn default_external(cluster: &mut KubeOneCluster) {
    let spec = &mut cluster.cloud_provider;
    if spec.external || !spec.provider.has_in_tree_implementation() {
        return;
    }

    let (major, minor) = EXTERNAL_CLOUD_PROVIDER_SINCE;
    match cluster.versions.kubernetes.parse::<KubernetesVersion>() {
        Ok(version) if version.is_at_least(major, minor) => {
            tracing::info!(
                provider = %spec.provider.kind(),
                %version,
                "Kubernetes no longer ships in-tree cloud providers, using the external cloud controller manager"
            );
            spec.external = true;
        }
        Ok(_) => {}
        // TODO: Decide whether an unparsable version should fail the run
        // instead of leaving the flag untouched.
        Err(error) => tracing::debug!(
            %error,
            "Unable to parse Kubernetes version, skipping external cloud provider defaulting"
        ),
    }
}

fn default_cloud_config(cluster: &mut KubeOneCluster) {
    let spec = &mut cluster.cloud_provider;
    if !spec.external || !spec.cloud_config.is_empty() {
        return;
    }

    let name = &cluster.name;
    spec.cloud_config = match spec.provider {
        CloudProvider::Aws(_) => format!("[global]\nKubernetesClusterID={name}"),
        CloudProvider::Gce(_) => format!("[global]\nmultizone = true\nnode-tags = {name}"),
        _ => return,
    };
}
