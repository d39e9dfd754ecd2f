use crate::config::VsphereEnv;
use crate::vsphere::Vsphere;
use crate::vsphere::types::*;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use vmtools_common::prelude::{Error, Result, VsphereError};

/// Header carrying the session token of the vim JSON API.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// Upper bound for establishing a TCP/TLS connection to the vCenter.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Concrete implementation of the `Vsphere` trait on top of the vim JSON API
/// (`/sdk/vim25/{release}`), using `reqwest`.
///
/// A value of this type always holds a logged-in session; it is created by
/// [`VsphereClient::connect`] and ended by [`Vsphere::disconnect`].
///
pub struct VsphereClient {
    client: Client,
    base_url: String,
    content: ServiceContent,
    session: HeaderValue,
}

impl VsphereClient {
    /// Retrieves the service content and logs in.
    ///
    /// # Arguments
    ///
    /// * `settings`: Address, credentials and TLS settings of the vCenter.
    ///
    pub async fn connect(settings: &VsphereEnv) -> Result<Self> {
        if settings.insecure {
            tracing::warn!(target: "vsphere", "TLS certificate verification is disabled!");
        }
        let client = Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(settings.insecure)
            .connect_timeout(CONNECT_TIMEOUT.min(settings.request_timeout()))
            .timeout(settings.request_timeout())
            .build()?;
        let base_url = settings.base_url();

        let content: ServiceContent = checked(
            client.get(format!("{}/ServiceInstance/ServiceInstance/content", base_url)),
            VsphereError::Content,
        )
        .await?
        .json()
        .await?;
        tracing::debug!(target: "vsphere", ?content, "Service content retrieved");

        let credentials = LoginRequest {
            user_name: &settings.username,
            password: settings.password.expose_secret(),
        };
        let path = format!(
            "{}/SessionManager/{}/Login",
            base_url,
            content.session_manager.encoded()
        );
        let response = checked(client.post(path).json(&credentials), VsphereError::Login).await?;
        let mut session = response
            .headers()
            .get(SESSION_HEADER)
            .cloned()
            .ok_or_else(|| {
                Error::Vsphere(
                    VsphereError::Login,
                    response.status(),
                    format!("Response has no `{}` header", SESSION_HEADER),
                )
            })?;
        session.set_sensitive(true);
        tracing::info!(target: "vsphere", url = %base_url, user = %settings.username, "Logged in");

        Ok(Self {
            client,
            base_url,
            content,
            session,
        })
    }

    /// Generic helper method to perform an authenticated request.
    ///
    /// # Arguments
    ///
    /// * `method`: HTTP method to use for the request.
    /// * `path`: API path below the versioned root, starting with `/`.
    /// * `body`: Optional JSON request body.
    /// * `error_var`: Specific error to use if the API call fails.
    ///
    async fn make_request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        error_var: VsphereError,
    ) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header(SESSION_HEADER, self.session.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        checked(request, error_var).await
    }

    /// Performs a request and deserializes the JSON response.
    ///
    async fn call<B, D>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        error_var: VsphereError,
    ) -> Result<D>
    where
        B: Serialize + ?Sized,
        D: DeserializeOwned,
    {
        let response = self.make_request(method, path, body, error_var).await?;
        Ok(response.json::<D>().await?)
    }

    /// Performs a request whose response carries no data.
    ///
    async fn invoke<B>(
        &self,
        path: &str,
        body: Option<&B>,
        error_var: VsphereError,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.make_request(Method::POST, path, body, error_var)
            .await
            .map(|_| ())
    }

    async fn start_task<B>(
        &self,
        vm: &ManagedObjectRef,
        method_name: &str,
        body: Option<&B>,
        error_var: VsphereError,
    ) -> Result<TaskRef>
    where
        B: Serialize + ?Sized,
    {
        let path = format!("/VirtualMachine/{}/{}", vm.encoded(), method_name);
        let task: ManagedObjectRef = self.call(Method::POST, &path, body, error_var).await?;
        tracing::debug!(target: "vsphere", %vm, %task, method_name, "Task started");
        Ok(task.into())
    }

    async fn list_view(
        &self,
        view: &ManagedObjectRef,
        kind: EntityKind,
    ) -> Result<Vec<Entity>> {
        let path = format!("/ContainerView/{}/view", view.encoded());
        let morefs: Vec<ManagedObjectRef> = self
            .call(Method::GET, &path, None::<&()>, VsphereError::Inventory)
            .await?;

        let mut entities = Vec::with_capacity(morefs.len());
        for moref in morefs {
            let path = format!("/{}/{}/name", kind, moref.encoded());
            let name: String = self
                .call(Method::GET, &path, None::<&()>, VsphereError::Property)
                .await?;
            entities.push(Entity { moref, name });
        }
        Ok(entities)
    }
}

/// Sends the request and turns any non-success status into an error.
///
async fn checked(request: RequestBuilder, error_var: VsphereError) -> Result<reqwest::Response> {
    let response = request.send().await?;

    match response.status() {
        status if status.is_success() => Ok(response),
        status => {
            let text = response.text().await?;
            Err(Error::Vsphere(error_var, status, text))
        }
    }
}

#[async_trait]
impl Vsphere for VsphereClient {
    async fn inventory(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        let request = CreateContainerViewRequest {
            container: self.content.root_folder.clone(),
            kinds: vec![kind.to_string()],
            recursive: true,
        };
        let path = format!(
            "/ViewManager/{}/CreateContainerView",
            self.content.view_manager.encoded()
        );
        let view: ManagedObjectRef = self
            .call(Method::POST, &path, Some(&request), VsphereError::Inventory)
            .await?;

        let entities = self.list_view(&view, kind).await;

        // Views live in the session until destroyed.
        let path = format!("/ContainerView/{}/DestroyView", view.encoded());
        if let Err(error) = self
            .invoke(&path, None::<&()>, VsphereError::Inventory)
            .await
        {
            tracing::warn!(target: "vsphere", %view, ?error, "Failed to destroy container view");
        }

        let entities = entities?;
        tracing::debug!(target: "vsphere", %kind, count = entities.len(), "Inventory enumerated");
        Ok(entities)
    }

    async fn is_template(&self, vm: &ManagedObjectRef) -> Result<bool> {
        let path = format!("/VirtualMachine/{}/config", vm.encoded());
        let config: Option<VmConfigInfo> = self
            .call(Method::GET, &path, None::<&()>, VsphereError::Property)
            .await?;
        Ok(config.is_some_and(|config| config.template))
    }

    async fn mark_as_virtual_machine(
        &self,
        vm: &ManagedObjectRef,
        pool: Option<&ManagedObjectRef>,
    ) -> Result<()> {
        let path = format!("/VirtualMachine/{}/MarkAsVirtualMachine", vm.encoded());
        let request = MarkAsVirtualMachineRequest {
            pool: pool.cloned(),
        };
        self.invoke(&path, Some(&request), VsphereError::MarkAsVirtualMachine)
            .await
    }

    async fn power_on(&self, vm: &ManagedObjectRef) -> Result<TaskRef> {
        self.start_task(vm, "PowerOnVM_Task", None::<&()>, VsphereError::PowerOn)
            .await
    }

    async fn upgrade_hardware(
        &self,
        vm: &ManagedObjectRef,
        version: Option<&str>,
    ) -> Result<TaskRef> {
        let request = UpgradeVmRequest {
            version: version.map(str::to_owned),
        };
        self.start_task(
            vm,
            "UpgradeVM_Task",
            Some(&request),
            VsphereError::UpgradeHardware,
        )
        .await
    }

    async fn upgrade_tools(&self, vm: &ManagedObjectRef) -> Result<TaskRef> {
        self.start_task(
            vm,
            "UpgradeTools_Task",
            None::<&()>,
            VsphereError::UpgradeTools,
        )
        .await
    }

    async fn power_off(&self, vm: &ManagedObjectRef) -> Result<TaskRef> {
        self.start_task(vm, "PowerOffVM_Task", None::<&()>, VsphereError::PowerOff)
            .await
    }

    async fn mark_as_template(&self, vm: &ManagedObjectRef) -> Result<()> {
        let path = format!("/VirtualMachine/{}/MarkAsTemplate", vm.encoded());
        self.invoke(&path, None::<&()>, VsphereError::MarkAsTemplate)
            .await
    }

    async fn task_status(&self, task: &TaskRef) -> Result<TaskStatus> {
        let path = format!("/Task/{}/info", task.as_moref().encoded());
        let info: TaskInfo = self
            .call(Method::GET, &path, None::<&()>, VsphereError::TaskStatus)
            .await?;
        Ok(info.into())
    }

    async fn disconnect(&self) -> Result<()> {
        let path = format!(
            "/SessionManager/{}/Logout",
            self.content.session_manager.encoded()
        );
        self.invoke(&path, None::<&()>, VsphereError::Logout)
            .await?;
        tracing::info!(target: "vsphere", "Logged out");
        Ok(())
    }
}
