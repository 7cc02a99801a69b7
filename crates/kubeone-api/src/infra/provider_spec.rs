//! Typed views on the machine-controller instance parameters of each provider.
//!
//! The canonical model keeps the parameters of a worker pool as plain JSON. To
//! merge discovered parameters into user-authored ones the JSON is decoded into
//! the view of the active provider first, which rejects parameters the
//! provider does not know about instead of silently carrying them along.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::{ResultExt, Snafu};

use crate::{
    api::{CloudProvider, CloudProviderKind},
    infra::fill::FillIfZero,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to decode the {which} instance parameters as {provider} parameters"))]
    DecodeView {
        source: serde_json::Error,
        which: &'static str,
        provider: CloudProviderKind,
    },

    #[snafu(display("failed to encode the merged {provider} instance parameters"))]
    EncodeView {
        source: serde_json::Error,
        provider: CloudProviderKind,
    },

    #[snafu(display("the {provider} cloud provider does not support dynamic workers"))]
    DynamicWorkersNotSupported { provider: CloudProviderKind },
}

/// Declares a view struct with only optional fields, together with the
/// matching [`FillIfZero`] implementation.
macro_rules! provider_view {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident: $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
        #[serde(default, deny_unknown_fields, rename_all = "camelCase")]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl FillIfZero for $name {
            fn fill_if_zero(&mut self, discovered: &Self) {
                $(self.$field.fill_if_zero(&discovered.$field);)*
            }
        }
    };
}

type Tags = BTreeMap<String, String>;

provider_view!(AwsView {
    region: String,
    availability_zone: String,
    vpc_id: String,
    subnet_id: String,
    #[serde(rename = "securityGroupIDs")]
    security_group_ids: Vec<String>,
    instance_profile: String,
    instance_type: String,
    ami: String,
    disk_size: u32,
    disk_type: String,
    disk_iops: u32,
    ebs_volume_encrypted: bool,
    #[serde(rename = "assignPublicIP")]
    assign_public_ip: bool,
    is_spot_instance: bool,
    spot_instance_config: Value,
    tags: Tags,
});

provider_view!(AzureView {
    location: String,
    resource_group: String,
    vnet_resource_group: String,
    vm_size: String,
    vnet_name: String,
    subnet_name: String,
    route_table_name: String,
    availability_set: String,
    security_group_name: String,
    #[serde(rename = "imageID")]
    image_id: String,
    os_disk_size: u32,
    data_disk_size: u32,
    #[serde(rename = "assignPublicIP")]
    assign_public_ip: bool,
    assign_availability_set: bool,
    load_balancer_sku: String,
    zones: Vec<String>,
    tags: Tags,
});

provider_view!(DigitalOceanView {
    region: String,
    size: String,
    backups: bool,
    ipv6: bool,
    #[serde(rename = "private_networking")]
    private_networking: bool,
    monitoring: bool,
    tags: Vec<String>,
});

provider_view!(GceView {
    zone: String,
    machine_type: String,
    disk_size: u32,
    disk_type: String,
    network: String,
    subnetwork: String,
    preemptible: bool,
    provisioning_model: String,
    #[serde(rename = "assignPublicIPAddress")]
    assign_public_ip_address: bool,
    multizone: bool,
    regional: bool,
    custom_image: String,
    disable_machine_service_account: bool,
    enable_nested_virtualization: bool,
    #[serde(rename = "minCPUPlatform")]
    min_cpu_platform: String,
    labels: Tags,
    tags: Vec<String>,
});

provider_view!(HetznerView {
    server_type: String,
    datacenter: String,
    location: String,
    image: String,
    placement_group_prefix: String,
    networks: Vec<String>,
    firewalls: Vec<String>,
    #[serde(rename = "assignPublicIPv4")]
    assign_public_ipv4: bool,
    #[serde(rename = "assignPublicIPv6")]
    assign_public_ipv6: bool,
    labels: Tags,
});

provider_view!(NutanixView {
    cluster_name: String,
    project_name: String,
    subnet_name: String,
    image_name: String,
    cpus: u32,
    cpu_cores: u32,
    cpu_passthrough: bool,
    #[serde(rename = "memoryMB")]
    memory_mb: u32,
    disk_size: u32,
    categories: Tags,
});

provider_view!(OpenStackView {
    image: String,
    flavor: String,
    security_groups: Vec<String>,
    #[serde(rename = "floatingIPPool")]
    floating_ip_pool: String,
    availability_zone: String,
    network: String,
    subnet: String,
    #[serde(rename = "rootDiskSizeGB")]
    root_disk_size_gb: u32,
    root_disk_volume_type: String,
    node_volume_attach_limit: u32,
    config_drive: bool,
    server_group: String,
    trust_device_path: bool,
    tags: Tags,
});

provider_view!(EquinixMetalView {
    instance_type: String,
    metro: String,
    facilities: Vec<String>,
    billing_cycle: String,
    tags: Vec<String>,
});

provider_view!(VSphereView {
    #[serde(rename = "templateVMName")]
    template_vm_name: String,
    #[serde(rename = "vmNetName")]
    vm_net_name: String,
    cluster: String,
    datacenter: String,
    datastore: String,
    datastore_cluster: String,
    folder: String,
    resource_pool: String,
    cpus: u32,
    #[serde(rename = "memoryMB")]
    memory_mb: u32,
    #[serde(rename = "diskSizeGB")]
    disk_size_gb: u32,
    allow_insecure: bool,
    tags: Value,
});

provider_view!(VmwareCloudDirectorView {
    organization: String,
    vdc: String,
    vapp: String,
    catalog: String,
    template: String,
    network: String,
    ip_allocation_mode: String,
    cpus: u32,
    cpu_cores: u32,
    #[serde(rename = "memoryMB")]
    memory_mb: u32,
    #[serde(rename = "diskSizeGB")]
    disk_size_gb: u32,
    disk_iops: u32,
    storage_profile: String,
    sizing_policy: String,
    placement_policy: String,
    metadata: Tags,
});

provider_view!(KubevirtView {
    virtual_machine: Value,
    affinity: Value,
    topology_spread_constraints: Value,
});

/// Merges the `discovered` instance parameters into the `user` ones through
/// the view of the given provider. Parameters set by the user win.
pub(super) fn merge_cloud_provider_spec(
    provider: &CloudProvider,
    user: &mut Value,
    discovered: &Value,
) -> Result<()> {
    match provider {
        CloudProvider::Aws(_) => merge_view::<AwsView>(provider, user, discovered),
        CloudProvider::Azure(_) => merge_view::<AzureView>(provider, user, discovered),
        CloudProvider::DigitalOcean(_) => {
            merge_view::<DigitalOceanView>(provider, user, discovered)
        }
        CloudProvider::Gce(_) => merge_view::<GceView>(provider, user, discovered),
        CloudProvider::Hetzner(_) => merge_view::<HetznerView>(provider, user, discovered),
        CloudProvider::Nutanix(_) => merge_view::<NutanixView>(provider, user, discovered),
        CloudProvider::OpenStack(_) => merge_view::<OpenStackView>(provider, user, discovered),
        CloudProvider::EquinixMetal(_) => {
            merge_view::<EquinixMetalView>(provider, user, discovered)
        }
        CloudProvider::VSphere(_) => merge_view::<VSphereView>(provider, user, discovered),
        CloudProvider::VmwareCloudDirector(_) => {
            merge_view::<VmwareCloudDirectorView>(provider, user, discovered)
        }
        CloudProvider::Kubevirt(_) => merge_view::<KubevirtView>(provider, user, discovered),
        CloudProvider::None(_) => DynamicWorkersNotSupportedSnafu {
            provider: provider.kind(),
        }
        .fail(),
    }
}

fn merge_view<V>(provider: &CloudProvider, user: &mut Value, discovered: &Value) -> Result<()>
where
    V: Default + DeserializeOwned + FillIfZero + Serialize,
{
    let provider = provider.kind();
    let mut view = decode_view::<V>(user, "user", provider)?;
    view.fill_if_zero(&decode_view(discovered, "discovered", provider)?);

    *user = serde_json::to_value(view).context(EncodeViewSnafu { provider })?;
    Ok(())
}

fn decode_view<V>(value: &Value, which: &'static str, provider: CloudProviderKind) -> Result<V>
where
    V: Default + DeserializeOwned,
{
    if value.is_null() {
        return Ok(V::default());
    }

    V::deserialize(value).context(DecodeViewSnafu { which, provider })
}
