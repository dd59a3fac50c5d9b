use std::sync::Arc;

use tracing::info;

use crate::{
    config::Config,
    error::Result,
    services::{
        auth::AuthService,
        catalog::CatalogService,
        media::MediaService,
        notification::NotificationService,
        product::ProductService,
        spreadsheet::SpreadsheetService,
        store::DocumentStore,
    },
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 认证服务
    pub auth_service: AuthService,

    /// 商品服务（持有商品集合的实时镜像）
    pub product_service: ProductService,

    /// 通知服务（持有通知集合的实时镜像）
    pub notification_service: NotificationService,

    /// 电子表格导入导出
    pub spreadsheet_service: SpreadsheetService,

    /// 媒体服务
    pub media_service: MediaService,

    /// 顾客目录
    pub catalog_service: CatalogService,
}

impl AppState {
    /// 创建全部服务并激活实时镜像
    pub async fn build(config: Config, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let media_service = MediaService::new(&config)?;
        Self::build_with_media(config, store, media_service).await
    }

    pub async fn build_with_media(
        config: Config,
        store: Arc<dyn DocumentStore>,
        media_service: MediaService,
    ) -> Result<Self> {
        let auth_service = AuthService::new(store.clone(), &config);
        let product_service = ProductService::new(store.clone(), media_service.clone(), &config).await?;
        let notification_service =
            NotificationService::new(store.clone(), config.notification_feed_limit).await?;
        let spreadsheet_service =
            SpreadsheetService::new(product_service.mirror().clone(), config.import_concurrency);
        let catalog_service = CatalogService::new(store, &config)?;

        info!(
            "Live mirrors ready: {} products, {} notifications",
            product_service.snapshot().len(),
            notification_service.mirror().snapshot().len()
        );

        Ok(Self {
            config,
            auth_service,
            product_service,
            notification_service,
            spreadsheet_service,
            media_service,
            catalog_service,
        })
    }
}
