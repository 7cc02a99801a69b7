use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants, EnumIter, EnumString};

/// Provider-agnostic cloud provider settings plus the selected provider.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct CloudProviderSpec {
    /// Whether the out-of-tree cloud controller manager is used.
    pub external: bool,
    pub disable_bundled_csi_drivers: bool,
    pub cloud_config: String,
    pub csi_config: String,
    pub provider: CloudProvider,
}

/// The cloud provider the cluster runs on.
///
/// [`CloudProvider::None`] is a real selection (bare metal or an unsupported
/// provider), it does not mean "not configured". It is also the [`Default`] so
/// that partially built models in tooling and tests stay valid.
#[derive(Clone, Debug, Deserialize, Eq, EnumDiscriminants, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[strum_discriminants(
    name(CloudProviderKind),
    derive(Display, EnumIter, EnumString, Hash, Ord, PartialOrd),
    strum(serialize_all = "lowercase")
)]
pub enum CloudProvider {
    Aws(AwsSpec),
    Azure(AzureSpec),
    #[serde(rename = "digitalocean")]
    DigitalOcean(DigitalOceanSpec),
    Gce(GceSpec),
    Hetzner(HetznerSpec),
    Nutanix(NutanixSpec),
    #[serde(rename = "openstack")]
    OpenStack(OpenStackSpec),
    #[serde(rename = "equinixmetal")]
    EquinixMetal(EquinixMetalSpec),
    #[serde(rename = "vsphere")]
    VSphere(VSphereSpec),
    #[serde(rename = "vmwareCloudDirector")]
    VmwareCloudDirector(VmwareCloudDirectorSpec),
    Kubevirt(KubevirtSpec),
    None(NoneSpec),
}

impl Default for CloudProvider {
    fn default() -> Self {
        Self::None(NoneSpec {})
    }
}

impl CloudProvider {
    pub fn kind(&self) -> CloudProviderKind {
        self.into()
    }

    /// Returns `true` if the Kubernetes tree used to ship a cloud provider
    /// implementation for this provider.
    pub fn has_in_tree_implementation(&self) -> bool {
        matches!(
            self,
            Self::Aws(_) | Self::Azure(_) | Self::Gce(_) | Self::OpenStack(_) | Self::VSphere(_)
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct AwsSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct AzureSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct DigitalOceanSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct GceSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct HetznerSpec {
    /// The Hetzner network the cluster is attached to. Used to live in the
    /// cluster network section of older manifests.
    #[serde(rename = "networkID")]
    pub network_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct NutanixSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct OpenStackSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct EquinixMetalSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct VSphereSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct VmwareCloudDirectorSpec {
    pub vapp: String,
    pub storage_profile: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct KubevirtSpec {
    pub infra_namespace: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct NoneSpec {}
