use crate::AwsCloud;
use crate::error::{classify, invalid_request, missing, optional};
use async_trait::async_trait;
use aws_sdk_cloudfront::types::{
    Aliases, AllowedMethods, CachedMethods, CookiePreference, CustomOriginConfig,
    DefaultCacheBehavior, DistributionConfig, ForwardedValues, Headers, HttpVersion,
    InvalidationBatch, ItemSelection, Method, MinimumProtocolVersion, Origin,
    OriginProtocolPolicy, OriginSslProtocols, Origins, Paths, PriceClass, S3OriginConfig,
    SslProtocol, SslSupportMethod, ViewerCertificate, ViewerProtocolPolicy,
};
use launchflow_cloud::gateway::{
    CachePolicy, CdnGateway, Distribution, DistributionPatch, DistributionSpec,
    DistributionSummary, OriginProtocol, OriginSpec, PRICE_CLASS_ALL,
};
use launchflow_cloud::GatewayResult;

fn methods(names: &[&str]) -> Vec<Method> {
    names.iter().map(|m| Method::from(*m)).collect()
}

fn count<T>(items: &[T]) -> i32 {
    i32::try_from(items.len()).unwrap_or(i32::MAX)
}

fn aliases(names: &[String]) -> GatewayResult<Aliases> {
    Aliases::builder()
        .quantity(count(names))
        .set_items(Some(names.to_vec()))
        .build()
        .map_err(|e| invalid_request("Aliases", e))
}

fn viewer_certificate(certificate_arn: Option<&str>) -> ViewerCertificate {
    match certificate_arn {
        Some(arn) => ViewerCertificate::builder()
            .acm_certificate_arn(arn)
            .ssl_support_method(SslSupportMethod::from("sni-only"))
            .minimum_protocol_version(MinimumProtocolVersion::from("TLSv1.2_2021"))
            .build(),
        None => ViewerCertificate::builder()
            .cloud_front_default_certificate(true)
            .build(),
    }
}

fn origin(spec: &OriginSpec) -> GatewayResult<Origin> {
    let op = "Origin";
    let builder = Origin::builder()
        .id(spec.id())
        .domain_name(spec.domain_name());
    let builder = match spec {
        OriginSpec::Custom { protocol, .. } => {
            let tls = OriginSslProtocols::builder()
                .quantity(1)
                .items(SslProtocol::from("TLSv1.2"))
                .build()
                .map_err(|e| invalid_request(op, e))?;
            let custom = CustomOriginConfig::builder()
                .http_port(80)
                .https_port(443)
                .origin_protocol_policy(OriginProtocolPolicy::from(protocol.as_str()))
                .origin_ssl_protocols(tls)
                .build()
                .map_err(|e| invalid_request(op, e))?;
            builder.custom_origin_config(custom)
        }
        OriginSpec::Bucket { .. } => builder.s3_origin_config(
            S3OriginConfig::builder()
                .origin_access_identity("")
                .build()
                .map_err(|e| invalid_request(op, e))?,
        ),
    };
    builder.build().map_err(|e| invalid_request(op, e))
}

/// Forward everything and cache nothing, or cache GET/HEAD keyed on the path only
fn cache_behavior(origin_id: &str, cache: CachePolicy) -> GatewayResult<DefaultCacheBehavior> {
    let op = "DefaultCacheBehavior";
    let pass_through = matches!(cache, CachePolicy::PassThrough);
    let allowed = if pass_through {
        methods(&["GET", "HEAD", "OPTIONS", "PUT", "POST", "PATCH", "DELETE"])
    } else {
        methods(&["GET", "HEAD"])
    };

    let cached = CachedMethods::builder()
        .quantity(2)
        .set_items(Some(methods(&["GET", "HEAD"])))
        .build()
        .map_err(|e| invalid_request(op, e))?;
    let allowed = AllowedMethods::builder()
        .quantity(count(&allowed))
        .set_items(Some(allowed))
        .cached_methods(cached)
        .build()
        .map_err(|e| invalid_request(op, e))?;

    let headers = if pass_through {
        Headers::builder().quantity(1).items("*").build()
    } else {
        Headers::builder().quantity(0).build()
    }
    .map_err(|e| invalid_request(op, e))?;
    let cookies = CookiePreference::builder()
        .forward(ItemSelection::from(if pass_through { "all" } else { "none" }))
        .build()
        .map_err(|e| invalid_request(op, e))?;
    let forwarded = ForwardedValues::builder()
        .query_string(pass_through)
        .cookies(cookies)
        .headers(headers)
        .build()
        .map_err(|e| invalid_request(op, e))?;

    DefaultCacheBehavior::builder()
        .target_origin_id(origin_id)
        .viewer_protocol_policy(ViewerProtocolPolicy::from("redirect-to-https"))
        .allowed_methods(allowed)
        .forwarded_values(forwarded)
        .compress(true)
        .min_ttl(0)
        .default_ttl(cache.default_ttl())
        .max_ttl(cache.default_ttl())
        .build()
        .map_err(|e| invalid_request(op, e))
}

fn distribution_config(spec: &DistributionSpec) -> GatewayResult<DistributionConfig> {
    let origins = Origins::builder()
        .quantity(1)
        .items(origin(&spec.origin)?)
        .build()
        .map_err(|e| invalid_request("Origins", e))?;
    DistributionConfig::builder()
        .caller_reference(&spec.caller_reference)
        .aliases(aliases(&spec.aliases)?)
        .set_default_root_object(spec.default_root_object.clone())
        .origins(origins)
        .default_cache_behavior(cache_behavior(spec.origin.id(), spec.cache)?)
        .viewer_certificate(viewer_certificate(spec.certificate_arn.as_deref()))
        .comment(&spec.comment)
        .price_class(PriceClass::from(PRICE_CLASS_ALL))
        .http_version(HttpVersion::Http2and3)
        .is_ipv6_enabled(true)
        .enabled(true)
        .build()
        .map_err(|e| invalid_request("DistributionConfig", e))
}

/// Overlay the requested changes on a fetched config
fn apply_patch(config: &mut DistributionConfig, patch: &DistributionPatch) {
    if let Some(arn) = &patch.certificate_arn {
        config.viewer_certificate = Some(viewer_certificate(Some(arn)));
    }
    if let Some(price_class) = &patch.price_class {
        config.price_class = Some(PriceClass::from(price_class.as_str()));
    }
    if let Some(protocol) = patch.origin_protocol
        && let Some(origins) = config.origins.as_mut()
    {
        for o in origins.items.iter_mut() {
            if let Some(custom) = o.custom_origin_config.as_mut() {
                custom.origin_protocol_policy = OriginProtocolPolicy::from(protocol.as_str());
            }
        }
    }
    if let Some(ttl) = patch.default_ttl
        && let Some(behavior) = config.default_cache_behavior.as_mut()
    {
        behavior.default_ttl = Some(ttl);
        behavior.max_ttl = Some(ttl);
    }
    if let Some(enabled) = patch.enabled {
        config.enabled = enabled;
    }
}

fn observed(
    id: &str,
    etag: &str,
    domain_name: &str,
    status: &str,
    config: &DistributionConfig,
) -> Distribution {
    Distribution {
        id: id.to_string(),
        etag: etag.to_string(),
        domain_name: domain_name.to_string(),
        status: status.to_string(),
        enabled: config.enabled(),
        aliases: config
            .aliases()
            .map(|a| a.items().to_vec())
            .unwrap_or_default(),
        certificate_arn: config
            .viewer_certificate()
            .and_then(|v| v.acm_certificate_arn())
            .map(str::to_string),
        price_class: config
            .price_class()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| PRICE_CLASS_ALL.to_string()),
        origin_protocol: config
            .origins()
            .and_then(|o| o.items().iter().find_map(|o| o.custom_origin_config()))
            .and_then(|c| OriginProtocol::parse(c.origin_protocol_policy().as_str())),
        default_ttl: config.default_cache_behavior().and_then(|b| b.default_ttl()),
    }
}

#[async_trait]
impl CdnGateway for AwsCloud {
    async fn list_distributions(&self) -> GatewayResult<Vec<DistributionSummary>> {
        let mut summaries = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let out = self
                .cloudfront
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| classify("ListDistributions", e))?;
            let Some(list) = out.distribution_list() else {
                break;
            };
            summaries.extend(list.items().iter().map(|d| DistributionSummary {
                id: d.id().to_string(),
                domain_name: d.domain_name().to_string(),
                aliases: d.aliases().map(|a| a.items().to_vec()).unwrap_or_default(),
                status: d.status().to_string(),
                enabled: d.enabled(),
            }));
            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(summaries)
    }

    async fn get_distribution(&self, id: &str) -> GatewayResult<Option<Distribution>> {
        let out = optional(
            self.cloudfront
                .get_distribution()
                .id(id)
                .send()
                .await
                .map_err(|e| classify("GetDistribution", e)),
        )?;
        let Some(out) = out else {
            return Ok(None);
        };
        let distribution = out
            .distribution()
            .ok_or_else(|| missing("GetDistribution", "Distribution"))?;
        let config = distribution
            .distribution_config()
            .ok_or_else(|| missing("GetDistribution", "DistributionConfig"))?;
        Ok(Some(observed(
            distribution.id(),
            out.e_tag().unwrap_or_default(),
            distribution.domain_name(),
            distribution.status(),
            config,
        )))
    }

    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> GatewayResult<DistributionSummary> {
        let out = self
            .cloudfront
            .create_distribution()
            .distribution_config(distribution_config(spec)?)
            .send()
            .await
            .map_err(|e| classify("CreateDistribution", e))?;
        let d = out
            .distribution()
            .ok_or_else(|| missing("CreateDistribution", "Distribution"))?;
        Ok(DistributionSummary {
            id: d.id().to_string(),
            domain_name: d.domain_name().to_string(),
            aliases: spec.aliases.clone(),
            status: d.status().to_string(),
            enabled: true,
        })
    }

    async fn update_distribution(
        &self,
        id: &str,
        etag: &str,
        patch: &DistributionPatch,
    ) -> GatewayResult<()> {
        let op = "GetDistributionConfig";
        let current = self
            .cloudfront
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(|e| classify(op, e))?;
        let mut config = current
            .distribution_config()
            .cloned()
            .ok_or_else(|| missing(op, "DistributionConfig"))?;
        apply_patch(&mut config, patch);

        // The config fetch carries its own ETag; the caller's may predate it.
        let if_match = current.e_tag().unwrap_or(etag);
        self.cloudfront
            .update_distribution()
            .id(id)
            .if_match(if_match)
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| classify("UpdateDistribution", e))?;
        Ok(())
    }

    async fn delete_distribution(&self, id: &str, etag: &str) -> GatewayResult<()> {
        self.cloudfront
            .delete_distribution()
            .id(id)
            .if_match(etag)
            .send()
            .await
            .map_err(|e| classify("DeleteDistribution", e))?;
        Ok(())
    }

    async fn create_invalidation(
        &self,
        id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> GatewayResult<String> {
        let op = "CreateInvalidation";
        let batch = InvalidationBatch::builder()
            .paths(
                Paths::builder()
                    .quantity(count(paths))
                    .set_items(Some(paths.to_vec()))
                    .build()
                    .map_err(|e| invalid_request(op, e))?,
            )
            .caller_reference(caller_reference)
            .build()
            .map_err(|e| invalid_request(op, e))?;
        let out = self
            .cloudfront
            .create_invalidation()
            .distribution_id(id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| classify(op, e))?;
        out.invalidation()
            .map(|i| i.id().to_string())
            .ok_or_else(|| missing(op, "Invalidation"))
    }
}
