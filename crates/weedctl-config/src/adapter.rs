use weedctl_types::{ProbeKind, ProbeSpec, ServiceName, ServiceSpec};

use crate::{args::ArgBuilder, ClusterConfig};

impl ClusterConfig {
    /// Build the launch description of every service, master first.
    #[must_use]
    pub fn service_specs(&self) -> Vec<ServiceSpec> {
        ServiceName::ALL
            .into_iter()
            .map(|name| self.service_spec(name))
            .collect()
    }

    #[must_use]
    pub fn service_spec(&self, name: ServiceName) -> ServiceSpec {
        let service = self.service(name);
        let data_dir = self.data_dir.join(name.as_str());

        ServiceSpec {
            name,
            enabled: service.enabled,
            program: self.binary.clone(),
            args: self.args(name, &data_dir),
            data_dir,
            log_file: self.data_dir.join(format!("{name}.log")),
            probe: self.probe(name),
            ports: self.ports(name),
        }
    }

    fn address(&self, name: ServiceName) -> String {
        format!("{}:{}", self.host, self.service(name).port)
    }

    fn args(&self, name: ServiceName, data_dir: &std::path::Path) -> Vec<String> {
        let port = self.service(name).port;
        let metrics = self.metrics_port_of(name);

        let builder = ArgBuilder::new(name.subcommand());
        let builder = match name {
            ServiceName::Master => builder
                .opt("ip", &self.host)
                .opt("port", port)
                .opt("mdir", data_dir.display())
                .opt("volumeSizeLimitMB", self.volume_size_limit_mb)
                .switch("raftHashicorp", self.raft),
            ServiceName::Volume => builder
                .opt("ip", &self.host)
                .opt("port", port)
                .opt("dir", data_dir.display())
                .opt("max", self.volume_max)
                .opt("mserver", self.address(ServiceName::Master)),
            ServiceName::Filer => builder
                .opt("ip", &self.host)
                .opt("port", port)
                .opt("master", self.address(ServiceName::Master))
                .opt("maxMB", self.filer_max_mb)
                .opt("defaultStoreDir", data_dir.display()),
            ServiceName::S3 => builder
                .opt("ip.bind", &self.host)
                .opt("port", port)
                .opt("filer", self.address(ServiceName::Filer))
                .opt_if("config", self.s3_config.as_ref().map(|p| p.display())),
            ServiceName::Mq => builder
                .opt("ip", &self.host)
                .opt("port", port)
                .opt("master", self.address(ServiceName::Master)),
        };

        builder.opt_if("metricsPort", metrics).build()
    }

    fn probe(&self, name: ServiceName) -> ProbeSpec {
        let (kind, path, fallback_path) = match name {
            ServiceName::Master => (ProbeKind::Http, Some("/cluster/status"), Some("/")),
            ServiceName::Volume => (ProbeKind::Http, Some("/status"), Some("/")),
            ServiceName::Filer => (ProbeKind::Http, Some("/"), None),
            ServiceName::S3 => (ProbeKind::Tcp, None, None),
            ServiceName::Mq => (ProbeKind::GrpcAsTcp, None, None),
        };

        ProbeSpec {
            kind,
            host: self.host.clone(),
            port: self.service(name).port,
            path: path.map(str::to_owned),
            fallback_path: fallback_path.map(str::to_owned),
            interval: self.poll_interval,
            attempt_timeout: self.health_timeout.min(self.poll_interval),
            max_attempts: self.max_attempts(),
        }
    }
}
