use crate::AwsCloud;
use crate::error::{classify, missing, optional};
use async_trait::async_trait;
use aws_sdk_acm::types::{DomainValidation, ValidationMethod};
use launchflow_cloud::GatewayResult;
use launchflow_cloud::gateway::{
    CertificateDetail, CertificateGateway, CertificateStatus, CertificateSummary,
    ValidationRecord,
};

fn status(value: Option<&aws_sdk_acm::types::CertificateStatus>) -> CertificateStatus {
    CertificateStatus::parse(value.map(|s| s.as_str()).unwrap_or_default())
}

fn validation_record(option: &DomainValidation) -> Option<ValidationRecord> {
    let record = option.resource_record()?;
    Some(ValidationRecord {
        domain: option.domain_name().to_string(),
        name: record.name().to_string(),
        record_type: record.r#type().as_str().to_string(),
        value: record.value().to_string(),
        status: option
            .validation_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
    })
}

#[async_trait]
impl CertificateGateway for AwsCloud {
    async fn list_certificates(&self) -> GatewayResult<Vec<CertificateSummary>> {
        let mut certificates = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let out = self
                .acm
                .list_certificates()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListCertificates", e))?;
            for c in out.certificate_summary_list() {
                let (Some(arn), Some(domain)) = (c.certificate_arn(), c.domain_name()) else {
                    continue;
                };
                certificates.push(CertificateSummary {
                    arn: arn.to_string(),
                    domain_name: domain.to_string(),
                    subject_alternative_names: c.subject_alternative_name_summaries().to_vec(),
                    status: status(c.status()),
                });
            }
            match out.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(certificates)
    }

    async fn request_certificate(
        &self,
        domain: &str,
        idempotency_token: &str,
    ) -> GatewayResult<String> {
        let out = self
            .acm
            .request_certificate()
            .domain_name(domain)
            .validation_method(ValidationMethod::Dns)
            .idempotency_token(idempotency_token)
            .send()
            .await
            .map_err(|e| classify("RequestCertificate", e))?;
        out.certificate_arn()
            .map(str::to_string)
            .ok_or_else(|| missing("RequestCertificate", "CertificateArn"))
    }

    async fn describe_certificate(&self, arn: &str) -> GatewayResult<Option<CertificateDetail>> {
        let out = optional(
            self.acm
                .describe_certificate()
                .certificate_arn(arn)
                .send()
                .await
                .map_err(|e| classify("DescribeCertificate", e)),
        )?;
        let Some(certificate) = out.as_ref().and_then(|out| out.certificate()) else {
            return Ok(None);
        };
        let options = certificate.domain_validation_options();
        Ok(Some(CertificateDetail {
            arn: certificate.certificate_arn().unwrap_or(arn).to_string(),
            domain_name: certificate.domain_name().unwrap_or_default().to_string(),
            status: status(certificate.status()),
            validation_records: options.iter().filter_map(validation_record).collect(),
            validation_options: options.len(),
        }))
    }
}
